//! Pipeline configuration
//!
//! One immutable [`PipelineConfig`] is built at startup and handed to every
//! stage. Values come from, in increasing precedence:
//!
//! 1. built-in defaults
//! 2. an optional YAML file
//! 3. environment variables (usually sourced from a `.env` file)
//!
//! Expected environment variables, all optional:
//! - ETL_SOURCE_PATH: delimited source file
//! - ETL_SOURCE_DELIMITER: single-byte field delimiter
//! - REDIS_HOST, REDIS_PORT, REDIS_DB: buffer connection
//! - ETL_BUFFER_TTL_SECS: expire buffer entries after this many seconds
//! - ETL_BUFFER_NAMESPACE: prefix for the buffer keys
//! - MONGO_URI, MONGO_DATABASE, MONGO_COLLECTION: document store target
//! - ETL_TIMEOUT_SECS: timeout for every buffer and store call
//! - ETL_RETRY_DELAY_SECS: delay between stage attempts
//! - ETL_OWNER, ETL_NOTIFY_EMAIL: who failure/retry notices are addressed to

use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub path: PathBuf,
    pub delimiter: char,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./customers-1000.csv"),
            delimiter: ',',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    /// Entries never expire when unset; the next run overwrites them
    pub ttl_secs: Option<u64>,
    pub namespace: Option<String>,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            ttl_secs: None,
            namespace: None,
        }
    }
}

impl BufferConfig {
    /// Connection URL in `redis://host:port/db` form
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017/".to_string(),
            database: "Airflow".to_string(),
            collection: "simple_ETL".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts for tasks without their own policy
    pub default_attempts: u32,
    pub extract_attempts: u32,
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            default_attempts: 2,
            extract_attempts: 3,
            delay_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub owner: String,
    pub email: Option<String>,
    pub on_failure: bool,
    pub on_retry: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            owner: "airflow".to_string(),
            email: None,
            on_failure: true,
            on_retry: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub buffer: BufferConfig,
    pub store: StoreConfig,
    pub retry: RetryConfig,
    pub notify: NotifyConfig,
    pub timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            buffer: BufferConfig::default(),
            store: StoreConfig::default(),
            retry: RetryConfig::default(),
            notify: NotifyConfig::default(),
            timeout_secs: 30,
        }
    }
}

impl PipelineConfig {
    /// Build the configuration from an optional YAML file and the environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::read_yaml(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn read_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Override fields from environment variables that are set
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = env_var("ETL_SOURCE_PATH") {
            self.source.path = PathBuf::from(path);
        }
        if let Some(delimiter) = env_parse::<char>("ETL_SOURCE_DELIMITER")? {
            self.source.delimiter = delimiter;
        }
        if let Some(host) = env_var("REDIS_HOST") {
            self.buffer.host = host;
        }
        if let Some(port) = env_parse("REDIS_PORT")? {
            self.buffer.port = port;
        }
        if let Some(db) = env_parse("REDIS_DB")? {
            self.buffer.db = db;
        }
        if let Some(ttl) = env_parse("ETL_BUFFER_TTL_SECS")? {
            self.buffer.ttl_secs = Some(ttl);
        }
        if let Some(namespace) = env_var("ETL_BUFFER_NAMESPACE") {
            self.buffer.namespace = Some(namespace);
        }
        if let Some(uri) = env_var("MONGO_URI") {
            self.store.uri = uri;
        }
        if let Some(database) = env_var("MONGO_DATABASE") {
            self.store.database = database;
        }
        if let Some(collection) = env_var("MONGO_COLLECTION") {
            self.store.collection = collection;
        }
        if let Some(timeout) = env_parse("ETL_TIMEOUT_SECS")? {
            self.timeout_secs = timeout;
        }
        if let Some(delay) = env_parse("ETL_RETRY_DELAY_SECS")? {
            self.retry.delay_secs = delay;
        }
        if let Some(owner) = env_var("ETL_OWNER") {
            self.notify.owner = owner;
        }
        if let Some(email) = env_var("ETL_NOTIFY_EMAIL") {
            self.notify.email = Some(email);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.source.delimiter.is_ascii() {
            bail!(
                "Source delimiter must be a single ASCII character, got '{}'",
                self.source.delimiter
            );
        }
        if self.buffer.host.is_empty() {
            bail!("Buffer host must not be empty");
        }
        if self.buffer.port == 0 {
            bail!("Buffer port must not be 0");
        }

        let uri = Url::parse(&self.store.uri)
            .with_context(|| format!("Invalid MONGO_URI: {}", self.store.uri))?;
        if !matches!(uri.scheme(), "mongodb" | "mongodb+srv") {
            bail!(
                "MONGO_URI must use the mongodb:// or mongodb+srv:// scheme, got {}://",
                uri.scheme()
            );
        }
        if self.store.database.is_empty() || self.store.collection.is_empty() {
            bail!("Document store database and collection must both be set");
        }

        if self.timeout_secs == 0 {
            bail!("ETL_TIMEOUT_SECS must be at least 1");
        }
        if self.retry.default_attempts == 0 || self.retry.extract_attempts == 0 {
            bail!("Retry attempts must be at least 1");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The delimiter as the byte the CSV reader expects
    pub fn delimiter_byte(&self) -> u8 {
        u8::try_from(self.source.delimiter).unwrap_or(b',')
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| eyre::eyre!("Invalid {}='{}': {}", name, raw, e)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VARS: &[&str] = &[
        "ETL_SOURCE_PATH",
        "ETL_SOURCE_DELIMITER",
        "REDIS_HOST",
        "REDIS_PORT",
        "REDIS_DB",
        "ETL_BUFFER_TTL_SECS",
        "ETL_BUFFER_NAMESPACE",
        "MONGO_URI",
        "MONGO_DATABASE",
        "MONGO_COLLECTION",
        "ETL_TIMEOUT_SECS",
        "ETL_RETRY_DELAY_SECS",
        "ETL_OWNER",
        "ETL_NOTIFY_EMAIL",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = PipelineConfig::load(None).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.buffer.url(), "redis://localhost:6379/0");
        assert_eq!(config.store.database, "Airflow");
        assert_eq!(config.store.collection, "simple_ETL");
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        unsafe {
            std::env::set_var("REDIS_HOST", "cache.internal");
            std::env::set_var("REDIS_PORT", "6380");
            std::env::set_var("MONGO_URI", "mongodb+srv://cluster.example.com/");
            std::env::set_var("ETL_BUFFER_TTL_SECS", "3600");
            std::env::set_var("ETL_RETRY_DELAY_SECS", "5");
            std::env::set_var("ETL_SOURCE_DELIMITER", ";");
        }

        let config = PipelineConfig::load(None).unwrap();
        clear_env();

        assert_eq!(config.buffer.url(), "redis://cache.internal:6380/0");
        assert_eq!(config.buffer.ttl_secs, Some(3600));
        assert_eq!(config.store.uri, "mongodb+srv://cluster.example.com/");
        assert_eq!(config.retry.delay_secs, 5);
        assert_eq!(config.delimiter_byte(), b';');
    }

    #[test]
    #[serial]
    fn test_invalid_env_value() {
        clear_env();
        unsafe { std::env::set_var("REDIS_PORT", "not-a-port") };
        let err = PipelineConfig::load(None).unwrap_err();
        clear_env();
        assert!(err.to_string().contains("REDIS_PORT"));
    }

    #[test]
    #[serial]
    fn test_rejects_non_mongo_uri() {
        clear_env();
        unsafe { std::env::set_var("MONGO_URI", "http://localhost:27017") };
        let err = PipelineConfig::load(None).unwrap_err();
        clear_env();
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    #[serial]
    fn test_yaml_file_then_env() {
        clear_env();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "source:\n  path: data/people.csv\nstore:\n  collection: people\nretry:\n  extract_attempts: 5\n"
        )
        .unwrap();
        unsafe { std::env::set_var("MONGO_COLLECTION", "people_v2") };

        let config = PipelineConfig::load(Some(file.path())).unwrap();
        clear_env();

        assert_eq!(config.source.path, PathBuf::from("data/people.csv"));
        assert_eq!(config.store.collection, "people_v2");
        assert_eq!(config.store.database, "Airflow");
        assert_eq!(config.retry.extract_attempts, 5);
        assert_eq!(config.retry.default_attempts, 2);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = PipelineConfig::default();
        config.retry.extract_attempts = 0;
        assert!(config.validate().is_err());
    }
}
