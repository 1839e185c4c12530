pub mod error;
pub mod types;

pub use error::{BrightDataError, Result};
pub use types::{Progress, SnapshotFormat, TriggerInput, TriggerResponse};

use std::time::Duration;

use serde::de::DeserializeOwned;
use types::SnapshotBody;

pub const BRIGHT_DATA_API_URL: &str = "https://api.brightdata.com";

pub struct BrightDataClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl BrightDataClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BRIGHT_DATA_API_URL.to_string(),
        }
    }

    /// Build a client whose requests fail with [`BrightDataError::Timeout`]
    /// after `timeout` instead of hanging.
    pub fn with_timeout(token: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token,
            base_url: BRIGHT_DATA_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a collection job for `dataset_id`. Returns as soon as the job is
    /// accepted. The job is billable, so this is never retried here.
    pub async fn trigger(&self, dataset_id: &str, inputs: &[TriggerInput]) -> Result<String> {
        let url = format!("{}/datasets/v3/trigger", self.base_url);
        tracing::debug!(dataset_id, inputs = inputs.len(), "Triggering snapshot");

        let resp = self
            .client
            .post(&url)
            .query(&[("dataset_id", dataset_id), ("include_errors", "true")])
            .bearer_auth(&self.token)
            .json(inputs)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BrightDataError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let trigger: TriggerResponse = resp.json().await?;
        if trigger.snapshot_id.trim().is_empty() {
            return Err(BrightDataError::MissingSnapshotId);
        }
        Ok(trigger.snapshot_id)
    }

    /// Query the current status of a snapshot once.
    pub async fn progress(&self, snapshot_id: &str) -> Result<Progress> {
        let url = format!("{}/datasets/v3/progress/{}", self.base_url, snapshot_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BrightDataError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let payload: serde_json::Value = resp.json().await?;
        let progress = Progress::from_payload(snapshot_id, payload);
        tracing::debug!(snapshot_id, status = %progress.status, "Snapshot progress");
        Ok(progress)
    }

    /// Download the records of a ready snapshot.
    pub async fn snapshot<T: DeserializeOwned>(
        &self,
        snapshot_id: &str,
        format: SnapshotFormat,
    ) -> Result<Vec<T>> {
        let url = format!("{}/datasets/v3/snapshot/{}", self.base_url, snapshot_id);
        let resp = self
            .client
            .get(&url)
            .query(&[("format", format.as_str())])
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BrightDataError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let text = resp.text().await?;
        let records = match format {
            SnapshotFormat::Json => serde_json::from_str::<SnapshotBody<T>>(&text)?.into_records(),
            SnapshotFormat::Ndjson => text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(serde_json::from_str)
                .collect::<std::result::Result<Vec<T>, _>>()?,
        };
        tracing::info!(snapshot_id, count = records.len(), "Fetched snapshot records");
        Ok(records)
    }
}
