// ScrapeService is the seam between the workflow and the scraping vendor.
// The Bright Data implementation lives here; tests use the in-memory mock
// in `testing`.

use anyhow::Result;
use async_trait::async_trait;

use brightdata_client::{BrightDataClient, SnapshotFormat, TriggerInput};

use crate::types::{JobState, JobStatus, ResultRecord, ScrapeRequest};

#[async_trait]
pub trait ScrapeService: Send + Sync {
    /// Submit a collection job. Returns the raw snapshot id.
    async fn trigger(&self, request: &ScrapeRequest) -> Result<String>;

    /// Query the job status once.
    async fn status(&self, snapshot_id: &str) -> Result<JobStatus>;

    /// Download all records of a ready job, in service order.
    async fn fetch(&self, snapshot_id: &str) -> Result<Vec<ResultRecord>>;
}

/// Bright Data datasets API bound to one dataset.
pub struct BrightDataScraper {
    client: BrightDataClient,
    dataset_id: String,
}

impl BrightDataScraper {
    pub fn new(client: BrightDataClient, dataset_id: impl Into<String>) -> Self {
        Self {
            client,
            dataset_id: dataset_id.into(),
        }
    }
}

pub(crate) fn trigger_inputs(request: &ScrapeRequest) -> Vec<TriggerInput> {
    let range = request.date_range();
    request
        .targets()
        .iter()
        .map(|url| TriggerInput {
            url: url.clone(),
            num_of_posts: request.limit(),
            start_date: range.start(),
            end_date: range.end(),
            order_by: request.sort_order().as_str().to_string(),
            country: request.extra_filter().to_string(),
        })
        .collect()
}

#[async_trait]
impl ScrapeService for BrightDataScraper {
    async fn trigger(&self, request: &ScrapeRequest) -> Result<String> {
        let inputs = trigger_inputs(request);
        Ok(self.client.trigger(&self.dataset_id, &inputs).await?)
    }

    async fn status(&self, snapshot_id: &str) -> Result<JobStatus> {
        let progress = self.client.progress(snapshot_id).await?;
        Ok(JobStatus {
            state: JobState::from_wire(&progress.status),
            snapshot_id: progress.snapshot_id,
            payload: progress.payload,
        })
    }

    async fn fetch(&self, snapshot_id: &str) -> Result<Vec<ResultRecord>> {
        let rows: Vec<serde_json::Value> = self
            .client
            .snapshot(snapshot_id, SnapshotFormat::Json)
            .await?;
        Ok(rows.iter().map(ResultRecord::from_json).collect())
    }
}
