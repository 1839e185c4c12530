use std::path::PathBuf;

use crate::types::{JobState, RunId};

/// Progress notifications emitted while a run moves through its stages.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Triggered { run_id: RunId, snapshot_id: String },
    /// A non-terminal status observed by the poller.
    Status { snapshot_id: String, state: JobState, attempt: u32 },
    ScrapeReady { snapshot_id: String },
    RecordsFetched { count: usize },
    Materialized { count: usize, dir: PathBuf },
    TaskStarted { index: usize, total: usize, agent: String },
    TaskFinished { index: usize, agent: String },
    Completed { run_id: RunId },
}

pub trait RunObserver: Send + Sync {
    fn on_event(&self, event: &RunEvent);
}

/// Observer that only logs.
pub struct LogObserver;

impl RunObserver for LogObserver {
    fn on_event(&self, event: &RunEvent) {
        match event {
            RunEvent::Triggered { run_id, snapshot_id } => {
                tracing::info!(%run_id, snapshot_id, "Scrape job triggered")
            }
            RunEvent::Status {
                snapshot_id,
                state,
                attempt,
            } => tracing::info!(snapshot_id, %state, attempt, "Scrape job in progress"),
            RunEvent::ScrapeReady { snapshot_id } => {
                tracing::info!(snapshot_id, "Scrape job ready")
            }
            RunEvent::RecordsFetched { count } => tracing::info!(count, "Records fetched"),
            RunEvent::Materialized { count, dir } => {
                tracing::info!(count, dir = %dir.display(), "Descriptors written")
            }
            RunEvent::TaskStarted {
                index,
                total,
                agent,
            } => tracing::info!(task = index + 1, total, agent, "Analysis task started"),
            RunEvent::TaskFinished { index, agent } => {
                tracing::debug!(task = index + 1, agent, "Analysis task finished")
            }
            RunEvent::Completed { run_id } => tracing::info!(%run_id, "Run completed"),
        }
    }
}

impl<F> RunObserver for F
where
    F: Fn(&RunEvent) + Send + Sync,
{
    fn on_event(&self, event: &RunEvent) {
        self(event)
    }
}
