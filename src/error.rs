//! Error types shared by every pipeline stage
//!
//! Only [`PipelineError::Connectivity`] is considered transient. Everything
//! else ends the stage immediately and, through the runner, the whole run.

use crate::etl::{RunState, Stage};
use thiserror::Error;

/// External collaborators a stage talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Buffer,
    DocumentStore,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffer => write!(f, "buffer"),
            Self::DocumentStore => write!(f, "document store"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source could not be read as a rectangular table
    #[error("source format error in {path}: {message}")]
    SourceFormat { path: String, message: String },

    /// The buffer key a stage depends on is absent or does not decode
    #[error("missing upstream artifact '{key}': {reason}")]
    MissingUpstreamArtifact { key: String, reason: String },

    /// Transient network or service failure, safe to retry
    #[error("{service} unreachable: {message}")]
    Connectivity { service: Service, message: String },

    /// Non-transient error reported by a service (auth, protocol, type errors)
    #[error("{service} error: {message}")]
    Service { service: Service, message: String },

    /// Bulk insert stopped part way; documents already written are kept
    #[error(
        "bulk insert stopped after {} of {attempted} documents: {message}",
        .inserted.map_or_else(|| "an unknown number".to_string(), |n| n.to_string())
    )]
    PartialInsert {
        inserted: Option<usize>,
        attempted: usize,
        message: String,
    },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("invalid run state transition from {from} on {event}")]
    InvalidTransition { from: RunState, event: String },

    /// The DAG declaration is not a valid chain of known tasks
    #[error("invalid pipeline definition: {0}")]
    Definition(String),

    /// Terminal: retries exhausted or a non-retryable error was hit
    #[error("{stage} failed after {attempts} attempt(s): {source}")]
    StageFailed {
        stage: Stage,
        attempts: u32,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    pub fn connectivity(service: Service, message: impl Into<String>) -> Self {
        Self::Connectivity {
            service,
            message: message.into(),
        }
    }

    pub fn missing(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MissingUpstreamArtifact {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether a stage may be attempted again after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }

    /// The innermost error, looking through `StageFailed`
    pub fn root(&self) -> &PipelineError {
        match self {
            Self::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }
}
