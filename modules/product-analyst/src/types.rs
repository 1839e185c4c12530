use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::WorkflowError;

// ---------------------------------------------------------------------------
// Run identity
// ---------------------------------------------------------------------------

/// Identifies one analysis run. Keys the run's descriptor directory so
/// concurrent runs never write to the same files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parse the directory-name form produced by `Display` (32 lowercase hex
    /// digits). Anything else, hyphenated UUIDs included, is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let id = Self(Uuid::parse_str(s).ok()?);
        (id.to_string() == s).then_some(id)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

// ---------------------------------------------------------------------------
// Scrape request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, WorkflowError> {
        if start > end {
            return Err(WorkflowError::InvalidRequest(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, WorkflowError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| {
                WorkflowError::InvalidRequest(format!("invalid date {s:?} (want YYYY-MM-DD): {e}"))
            })
        };
        Self::new(parse(start)?, parse(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Latest,
    Oldest,
    Popular,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Latest => "Latest",
            SortOrder::Oldest => "Oldest",
            SortOrder::Popular => "Popular",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(SortOrder::Latest),
            "oldest" => Ok(SortOrder::Oldest),
            "popular" => Ok(SortOrder::Popular),
            other => Err(WorkflowError::InvalidRequest(format!(
                "unknown sort order: {other}"
            ))),
        }
    }
}

/// What to scrape. Validated at construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    targets: Vec<String>,
    limit: u32,
    date_range: DateRange,
    sort_order: SortOrder,
    extra_filter: String,
}

impl ScrapeRequest {
    /// Blank targets (empty form fields) are dropped; at least one real
    /// `http`/`https` URL must remain.
    pub fn new(
        targets: impl IntoIterator<Item = impl Into<String>>,
        limit: u32,
        date_range: DateRange,
        sort_order: SortOrder,
        extra_filter: impl Into<String>,
    ) -> Result<Self, WorkflowError> {
        let targets: Vec<String> = targets
            .into_iter()
            .map(|t| t.into().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if targets.is_empty() {
            return Err(WorkflowError::InvalidRequest(
                "at least one product URL is required".to_string(),
            ));
        }

        for target in &targets {
            let parsed = url::Url::parse(target).map_err(|e| {
                WorkflowError::InvalidRequest(format!("invalid product URL {target:?}: {e}"))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(WorkflowError::InvalidRequest(format!(
                    "product URL must be http or https: {target}"
                )));
            }
        }

        if limit == 0 {
            return Err(WorkflowError::InvalidRequest(
                "limit must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            targets,
            limit,
            date_range,
            sort_order,
            extra_filter: extra_filter.into(),
        })
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn date_range(&self) -> DateRange {
        self.date_range
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn extra_filter(&self) -> &str {
        &self.extra_filter
    }
}

// ---------------------------------------------------------------------------
// Job handle and status
// ---------------------------------------------------------------------------

/// Handle to one remote scrape job. Never holds an empty id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    snapshot_id: String,
}

impl JobHandle {
    pub fn new(snapshot_id: impl Into<String>) -> Result<Self, WorkflowError> {
        let snapshot_id = snapshot_id.into().trim().to_string();
        if snapshot_id.is_empty() {
            return Err(WorkflowError::EmptySnapshotId);
        }
        Ok(Self { snapshot_id })
    }

    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.snapshot_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Ready,
    Failed,
    /// Any non-terminal state reported by the service ("starting",
    /// "running", "building", ...).
    InProgress(String),
}

impl JobState {
    pub fn from_wire(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "ready" => JobState::Ready,
            "failed" => JobState::Failed,
            _ => JobState::InProgress(status.trim().to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::InProgress(_))
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Ready => f.write_str("ready"),
            JobState::Failed => f.write_str("failed"),
            JobState::InProgress(s) => f.write_str(s),
        }
    }
}

/// One status observation. `payload` is the full document the service
/// returned, kept for failure reports.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub snapshot_id: String,
    pub state: JobState,
    pub payload: Value,
}

// ---------------------------------------------------------------------------
// Scraped records
// ---------------------------------------------------------------------------

/// One scraped product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
    pub features: Vec<String>,
    pub image_url: Option<String>,
}

impl ResultRecord {
    /// Map a raw dataset row onto the fields the analysis needs. Product
    /// datasets disagree on field names, so each field checks a list of
    /// candidates in priority order.
    pub fn from_json(row: &Value) -> Self {
        Self {
            id: first_scalar(row, &["id", "product_id", "asin"]),
            name: first_scalar(row, &["product_name", "name", "title"]),
            price: first_scalar(row, &["price", "final_price", "initial_price"]),
            description: first_scalar(row, &["description", "product_description"]),
            features: features(row),
            image_url: first_scalar(row, &["image_url", "image", "main_image"]),
        }
    }
}

fn first_scalar(row: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match row.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn features(row: &Value) -> Vec<String> {
    match row.get("features") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}
