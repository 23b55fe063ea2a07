//! Redis-backed hand-off buffer

use crate::config::BufferConfig;
use crate::error::{PipelineError, Service};
use crate::etl::Buffer;

use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::future::Future;
use std::time::Duration;

/// [`Buffer`] stored in Redis string keys
///
/// Every call opens its own multiplexed connection, the same way each stage
/// would when run as a separate task. Connecting and each command are bounded
/// by the configured timeout.
///
/// # Example
/// ```no_run
/// use simple_etl::client::RedisBuffer;
/// use simple_etl::config::BufferConfig;
/// use simple_etl::etl::Buffer;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), simple_etl::PipelineError> {
/// let buffer = RedisBuffer::try_new(&BufferConfig::default(), Duration::from_secs(5))?;
/// buffer.set("extracted_data", "{}".to_string()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct RedisBuffer {
    client: redis::Client,
    ttl: Option<u64>,
    timeout: Duration,
}

impl RedisBuffer {
    /// Create a buffer client; no connection is made until the first call
    ///
    /// # Errors
    /// Returns [`PipelineError::Service`] if the connection URL is invalid
    pub fn try_new(config: &BufferConfig, timeout: Duration) -> Result<Self, PipelineError> {
        let client = redis::Client::open(config.url()).map_err(map_error)?;
        Ok(Self {
            client,
            ttl: config.ttl_secs.filter(|ttl| *ttl > 0),
            timeout,
        })
    }

    /// Check the buffer answers `PING`
    pub async fn ping(&self) -> Result<(), PipelineError> {
        let mut conn = self.connect().await?;
        let _: String = self
            .bounded(redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }

    async fn connect(&self) -> Result<MultiplexedConnection, PipelineError> {
        log::debug!("Connecting to buffer at {}", self.client.get_connection_info().addr);
        self.bounded(self.client.get_multiplexed_async_connection())
            .await
    }

    async fn bounded<T, F>(&self, future: F) -> Result<T, PipelineError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        self.bounded_with(future, map_error).await
    }

    async fn bounded_with<T, F, M>(&self, future: F, map: M) -> Result<T, PipelineError>
    where
        F: Future<Output = redis::RedisResult<T>>,
        M: FnOnce(redis::RedisError) -> PipelineError,
    {
        match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result.map_err(map),
            Err(_) => Err(PipelineError::connectivity(
                Service::Buffer,
                format!("no response within {:?}", self.timeout),
            )),
        }
    }
}

impl Buffer for RedisBuffer {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PipelineError> {
        let mut conn = self.connect().await?;
        let value: Option<Vec<u8>> = self
            .bounded_with(conn.get(key), |err| map_get_error(key, err))
            .await?;
        log::debug!(
            "GET {} -> {}",
            key,
            value.as_ref().map_or("(nil)".to_string(), |v| format!("{} bytes", v.len()))
        );
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), PipelineError> {
        let mut conn = self.connect().await?;
        let len = value.len();
        match self.ttl {
            Some(ttl) => self.bounded(conn.set_ex::<_, _, ()>(key, value, ttl)).await?,
            None => self.bounded(conn.set::<_, _, ()>(key, value)).await?,
        }
        log::debug!("SET {} ({} bytes, ttl {:?})", key, len, self.ttl);
        Ok(())
    }
}

/// A key holding a list, hash or other non-string value cannot be an artifact
fn map_get_error(key: &str, err: redis::RedisError) -> PipelineError {
    if err.code() == Some("WRONGTYPE") {
        PipelineError::missing(key, format!("value is not a string: {}", err))
    } else {
        map_error(err)
    }
}

/// Sort Redis errors into transient and permanent failures
fn map_error(err: redis::RedisError) -> PipelineError {
    if err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
    {
        PipelineError::connectivity(Service::Buffer, err.to_string())
    } else {
        PipelineError::Service {
            service: Service::Buffer,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_new_does_not_connect() {
        let config = BufferConfig {
            host: "buffer.invalid".to_string(),
            port: 6390,
            ..BufferConfig::default()
        };
        let buffer = RedisBuffer::try_new(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(buffer.ttl, None);
    }

    #[test]
    fn test_zero_ttl_means_no_expiry() {
        let config = BufferConfig {
            ttl_secs: Some(0),
            ..BufferConfig::default()
        };
        let buffer = RedisBuffer::try_new(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(buffer.ttl, None);

        let config = BufferConfig {
            ttl_secs: Some(600),
            ..BufferConfig::default()
        };
        let buffer = RedisBuffer::try_new(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(buffer.ttl, Some(600));
    }

    #[test]
    fn test_error_classification() {
        let refused: redis::RedisError =
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into();
        assert!(map_error(refused).is_retryable());

        let typed: redis::RedisError =
            (redis::ErrorKind::TypeError, "WRONGTYPE not a string").into();
        assert!(!map_error(typed).is_retryable());
    }

    #[test]
    fn test_wrong_type_value_is_missing_artifact() {
        let reply = b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n";
        let err = redis::parse_redis_value(reply)
            .unwrap()
            .extract_error()
            .unwrap_err();

        let mapped = map_get_error("extracted_data", err);
        assert!(matches!(
            mapped,
            PipelineError::MissingUpstreamArtifact { ref key, .. } if key == "extracted_data"
        ));
        assert!(!mapped.is_retryable());

        let refused: redis::RedisError =
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into();
        assert!(map_get_error("extracted_data", refused).is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_buffer_is_connectivity_error() {
        // Port 1 on localhost is expected to refuse connections
        let config = BufferConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..BufferConfig::default()
        };
        let buffer = RedisBuffer::try_new(&config, Duration::from_secs(2)).unwrap();
        let err = buffer.get("extracted_data").await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {}", err);
    }
}
