use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::WorkflowError;
use crate::observer::{RunEvent, RunObserver};
use crate::scrape::ScrapeService;
use crate::types::{JobHandle, JobState, JobStatus};

#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Fixed wait between status checks.
    pub interval: Duration,
    /// Upper bound on total time spent waiting for a terminal status.
    pub max_wait: Duration,
    /// Optional cap on the number of status checks.
    pub max_attempts: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(30 * 60),
            max_attempts: None,
        }
    }
}

/// Waits for a scrape job to reach `ready` or `failed`.
pub struct Poller<'a> {
    service: &'a dyn ScrapeService,
    settings: PollSettings,
    cancel: CancellationToken,
}

impl<'a> Poller<'a> {
    pub fn new(
        service: &'a dyn ScrapeService,
        settings: PollSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            settings,
            cancel,
        }
    }

    /// Query immediately, then every `interval` until the job is terminal.
    ///
    /// Non-terminal statuses go to `observer`. Returns the ready status, or
    /// `JobFailed` with the full status payload, `TimedOut` once `max_wait`
    /// or `max_attempts` is exhausted, `Cancelled` if the token fires.
    pub async fn wait_until_ready(
        &self,
        handle: &JobHandle,
        observer: &dyn RunObserver,
    ) -> Result<JobStatus, WorkflowError> {
        let snapshot_id = handle.snapshot_id();
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(WorkflowError::Cancelled {
                    snapshot_id: snapshot_id.to_string(),
                });
            }

            let status = self.service.status(snapshot_id).await.map_err(|e| {
                WorkflowError::Poll {
                    snapshot_id: snapshot_id.to_string(),
                    source: e,
                }
            })?;
            attempts += 1;

            match &status.state {
                JobState::Ready => {
                    debug!(snapshot_id, attempts, "Snapshot ready");
                    return Ok(status);
                }
                JobState::Failed => {
                    warn!(snapshot_id, payload = %status.payload, "Snapshot failed");
                    return Err(WorkflowError::JobFailed {
                        snapshot_id: snapshot_id.to_string(),
                        payload: status.payload.to_string(),
                    });
                }
                JobState::InProgress(_) => {
                    observer.on_event(&RunEvent::Status {
                        snapshot_id: snapshot_id.to_string(),
                        state: status.state.clone(),
                        attempt: attempts,
                    });
                }
            }

            let waited = started.elapsed();
            let attempts_exhausted = self
                .settings
                .max_attempts
                .is_some_and(|max| attempts >= max);
            let next_wait = waited.saturating_add(self.settings.interval);
            if attempts_exhausted || next_wait > self.settings.max_wait {
                warn!(snapshot_id, attempts, ?waited, "Gave up waiting for snapshot");
                return Err(WorkflowError::TimedOut {
                    snapshot_id: snapshot_id.to_string(),
                    attempts,
                    waited,
                });
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(WorkflowError::Cancelled {
                        snapshot_id: snapshot_id.to_string(),
                    });
                }
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::LogObserver;
    use crate::testing::MockScraper;

    fn settings(max_wait: Duration) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(1),
            max_wait,
            max_attempts: None,
        }
    }

    #[tokio::test]
    async fn gives_up_when_next_wait_would_exceed_max_wait() {
        let scraper = MockScraper::new("s_1");
        let handle = JobHandle::new("s_1").unwrap();
        let poller = Poller::new(&scraper, settings(Duration::ZERO), CancellationToken::new());

        let err = poller.wait_until_ready(&handle, &LogObserver).await.unwrap_err();
        assert!(matches!(err, WorkflowError::TimedOut { attempts: 1, .. }));
        assert_eq!(scraper.status_calls(), 1);
    }

    #[tokio::test]
    async fn huge_interval_does_not_overflow() {
        let scraper = MockScraper::new("s_1");
        let handle = JobHandle::new("s_1").unwrap();
        let settings = PollSettings {
            interval: Duration::MAX,
            max_wait: Duration::from_secs(5),
            max_attempts: None,
        };
        let poller = Poller::new(&scraper, settings, CancellationToken::new());

        let err = poller.wait_until_ready(&handle, &LogObserver).await.unwrap_err();
        assert!(matches!(err, WorkflowError::TimedOut { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn already_cancelled_token_skips_status_check() {
        let scraper = MockScraper::new("s_1");
        let handle = JobHandle::new("s_1").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let poller = Poller::new(&scraper, settings(Duration::from_secs(5)), cancel);

        let err = poller.wait_until_ready(&handle, &LogObserver).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Cancelled { .. }));
        assert_eq!(scraper.status_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_statuses_keep_polling() {
        let scraper = MockScraper::new("s_1").statuses(&["starting", "building", "ready"]);
        let handle = JobHandle::new("s_1").unwrap();
        let poller = Poller::new(
            &scraper,
            settings(Duration::from_secs(5)),
            CancellationToken::new(),
        );

        let status = poller.wait_until_ready(&handle, &LogObserver).await.unwrap();
        assert_eq!(status.state, JobState::Ready);
        assert_eq!(scraper.status_calls(), 3);
    }
}
