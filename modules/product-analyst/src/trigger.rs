use tracing::{info, warn};

use crate::error::WorkflowError;
use crate::scrape::ScrapeService;
use crate::types::{JobHandle, ScrapeRequest};

/// Submit `request` and return the handle of the created job.
///
/// Called exactly once per run. A failed or ambiguous submission (timeout
/// included) is returned to the caller instead of being resubmitted, since a
/// second submission would start a second billable job.
pub async fn trigger(
    service: &dyn ScrapeService,
    request: &ScrapeRequest,
) -> Result<JobHandle, WorkflowError> {
    info!(
        targets = request.targets().len(),
        limit = request.limit(),
        start = %request.date_range().start(),
        end = %request.date_range().end(),
        "Triggering scrape job"
    );

    let snapshot_id = service.trigger(request).await.map_err(|e| {
        warn!(error = %e, "Scrape trigger failed");
        WorkflowError::Trigger(e)
    })?;

    JobHandle::new(snapshot_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{request, MockScraper};

    #[tokio::test]
    async fn returns_handle_for_accepted_job() {
        let scraper = MockScraper::new("s_abc");
        let handle = trigger(&scraper, &request(&["https://a.example/p"]))
            .await
            .unwrap();
        assert_eq!(handle.snapshot_id(), "s_abc");
        assert_eq!(scraper.trigger_calls(), 1);
    }

    #[tokio::test]
    async fn blank_snapshot_id_is_rejected() {
        let scraper = MockScraper::new("  ");
        let err = trigger(&scraper, &request(&["https://a.example/p"]))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::EmptySnapshotId));
    }
}
