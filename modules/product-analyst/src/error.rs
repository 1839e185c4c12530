//! Typed errors for one analysis run. Every variant past `InvalidRequest`
//! is terminal for the run; nothing here is retried.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Rejected locally, before anything was sent to the scraping service.
    #[error("invalid scrape request: {0}")]
    InvalidRequest(String),

    #[error("failed to trigger scrape job: {0:#}")]
    Trigger(#[source] anyhow::Error),

    #[error("scraping service returned an empty snapshot id")]
    EmptySnapshotId,

    #[error("failed to query status of snapshot {snapshot_id}: {source:#}")]
    Poll {
        snapshot_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("scrape job {snapshot_id} failed: {payload}")]
    JobFailed { snapshot_id: String, payload: String },

    #[error("scrape job {snapshot_id} not ready after {attempts} status checks ({waited:?})")]
    TimedOut {
        snapshot_id: String,
        attempts: u32,
        waited: Duration,
    },

    #[error("run cancelled while waiting for scrape job {snapshot_id}")]
    Cancelled { snapshot_id: String },

    #[error("failed to fetch results of snapshot {snapshot_id}: {source:#}")]
    Fetch {
        snapshot_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("scrape job {snapshot_id} finished with no records")]
    NoRecords { snapshot_id: String },

    #[error("failed to write descriptor {}: {source}", path.display())]
    Materialize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("analysis task {task} ({agent}) failed: {source:#}")]
    Pipeline {
        task: usize,
        agent: String,
        #[source]
        source: anyhow::Error,
    },
}

impl WorkflowError {
    /// Short machine-readable label, used in logs and the CLI exit summary.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::InvalidRequest(_) => "invalid_request",
            WorkflowError::Trigger(_) => "trigger",
            WorkflowError::EmptySnapshotId => "empty_snapshot_id",
            WorkflowError::Poll { .. } => "poll",
            WorkflowError::JobFailed { .. } => "job_failed",
            WorkflowError::TimedOut { .. } => "timed_out",
            WorkflowError::Cancelled { .. } => "cancelled",
            WorkflowError::Fetch { .. } => "fetch",
            WorkflowError::NoRecords { .. } => "no_records",
            WorkflowError::Materialize { .. } => "materialize",
            WorkflowError::Pipeline { .. } => "pipeline",
        }
    }
}
