//! Run state machine
//!
//! ```text
//! PENDING -> EXTRACTING -> EXTRACTED -> TRANSFORMING -> TRANSFORMED -> LOADING -> LOADED
//!                 |                          |                           |
//!                 +--------------------------+---------------------------+--> FAILED
//! ```

use super::Stage;
use crate::error::PipelineError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Pending,
    Extracting,
    Extracted,
    Transforming,
    Transformed,
    Loading,
    Loaded,
    Failed,
}

impl RunState {
    /// Enter the in-progress state of `stage`
    ///
    /// Only the stage directly after the last completed one may start.
    pub fn start(self, stage: Stage) -> Result<Self, PipelineError> {
        match (self, stage) {
            (Self::Pending, Stage::Extract) => Ok(Self::Extracting),
            (Self::Extracted, Stage::Transform) => Ok(Self::Transforming),
            (Self::Transformed, Stage::Load) => Ok(Self::Loading),
            (from, stage) => Err(PipelineError::InvalidTransition {
                from,
                event: format!("start {}", stage),
            }),
        }
    }

    /// Leave an in-progress state successfully
    pub fn complete(self) -> Result<Self, PipelineError> {
        match self {
            Self::Extracting => Ok(Self::Extracted),
            Self::Transforming => Ok(Self::Transformed),
            Self::Loading => Ok(Self::Loaded),
            from => Err(PipelineError::InvalidTransition {
                from,
                event: "complete".to_string(),
            }),
        }
    }

    /// Leave an in-progress state after retries are exhausted
    pub fn fail(self) -> Result<Self, PipelineError> {
        match self {
            Self::Extracting | Self::Transforming | Self::Loading => Ok(Self::Failed),
            from => Err(PipelineError::InvalidTransition {
                from,
                event: "fail".to_string(),
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Loaded | Self::Failed)
    }

    /// The stage currently running, if any
    pub fn running_stage(&self) -> Option<Stage> {
        match self {
            Self::Extracting => Some(Stage::Extract),
            Self::Transforming => Some(Stage::Transform),
            Self::Loading => Some(Stage::Load),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Extracting => "EXTRACTING",
            Self::Extracted => "EXTRACTED",
            Self::Transforming => "TRANSFORMING",
            Self::Transformed => "TRANSFORMED",
            Self::Loading => "LOADING",
            Self::Loaded => "LOADED",
            Self::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}
