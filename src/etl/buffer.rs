//! Hand-off buffer between stages

use crate::error::PipelineError;

/// Key written by the extract stage
pub const EXTRACTED_KEY: &str = "extracted_data";
/// Key written by the transform stage
pub const TRANSFORMED_KEY: &str = "transformed_data";

/// Key-value store holding serialized tables between stages
///
/// Values are never deleted after a read, so a failed stage can be retried
/// against the same upstream artifact.
pub trait Buffer: Send + Sync {
    /// Fetch the raw value stored under `key`, `None` if absent
    ///
    /// A value of the wrong kind for a string read is reported as
    /// [`PipelineError::MissingUpstreamArtifact`].
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>, PipelineError>> + Send;

    /// Store `value` under `key`, replacing any previous value
    fn set(
        &self,
        key: &str,
        value: String,
    ) -> impl std::future::Future<Output = Result<(), PipelineError>> + Send;
}

/// The pair of keys one run reads and writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferKeys {
    pub extracted: String,
    pub transformed: String,
}

impl BufferKeys {
    /// Keys prefixed with `"{namespace}:"`, or the bare keys for `None`
    ///
    /// Namespacing by run id keeps overlapping runs from reading each other's
    /// artifacts.
    pub fn namespaced(namespace: Option<&str>) -> Self {
        match namespace.filter(|ns| !ns.is_empty()) {
            Some(ns) => Self {
                extracted: format!("{}:{}", ns, EXTRACTED_KEY),
                transformed: format!("{}:{}", ns, TRANSFORMED_KEY),
            },
            None => Self::default(),
        }
    }
}

impl Default for BufferKeys {
    fn default() -> Self {
        Self {
            extracted: EXTRACTED_KEY.to_string(),
            transformed: TRANSFORMED_KEY.to_string(),
        }
    }
}
