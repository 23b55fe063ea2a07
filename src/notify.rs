//! Failure and retry notifications addressed to the DAG owner

use crate::dag::Dag;
use crate::error::PipelineError;
use crate::etl::Stage;

#[derive(Debug)]
pub enum RunEvent<'a> {
    /// A stage attempt failed and another attempt will follow
    Retry {
        stage: Stage,
        attempt: u32,
        max_attempts: u32,
        error: &'a PipelineError,
    },
    /// A stage failed for good; no downstream stage will run
    Failure {
        stage: Stage,
        error: &'a PipelineError,
    },
}

impl RunEvent<'_> {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Retry { stage, .. } | Self::Failure { stage, .. } => *stage,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: &RunEvent<'_>);
}

/// Notifier that reports events through the log
pub struct LogNotifier {
    recipient: String,
    on_failure: bool,
    on_retry: bool,
}

impl LogNotifier {
    pub fn new(recipient: impl Into<String>, on_failure: bool, on_retry: bool) -> Self {
        Self {
            recipient: recipient.into(),
            on_failure,
            on_retry,
        }
    }

    /// Address the DAG's email if set, its owner otherwise
    pub fn from_dag(dag: &Dag) -> Self {
        let recipient = dag.email.clone().unwrap_or_else(|| dag.owner.clone());
        Self::new(recipient, dag.email_on_failure, dag.email_on_retry)
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Whether `event` is one this notifier was asked to report
    pub fn wants(&self, event: &RunEvent<'_>) -> bool {
        match event {
            RunEvent::Retry { .. } => self.on_retry,
            RunEvent::Failure { .. } => self.on_failure,
        }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, event: &RunEvent<'_>) {
        if !self.wants(event) {
            return;
        }
        match event {
            RunEvent::Retry {
                stage,
                attempt,
                max_attempts,
                error,
            } => log::warn!(
                "[notify {}] {} attempt {}/{} failed, retrying: {}",
                self.recipient,
                stage,
                attempt,
                max_attempts,
                error
            ),
            RunEvent::Failure { stage, error } => {
                log::error!("[notify {}] {} failed: {}", self.recipient, stage, error)
            }
        }
    }
}
