use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One entry in the trigger request body. The datasets API takes a JSON
/// array with one object per target URL.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerInput {
    pub url: String,
    pub num_of_posts: u32,
    /// Serialized as `YYYY-MM-DD`.
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub order_by: String,
    pub country: String,
}

/// Response to `POST /datasets/v3/trigger`.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerResponse {
    #[serde(default)]
    pub snapshot_id: String,
}

/// Status of a snapshot as reported by `GET /datasets/v3/progress/{id}`.
///
/// `payload` keeps the full response body so callers can report it verbatim
/// when a job fails.
#[derive(Debug, Clone)]
pub struct Progress {
    pub snapshot_id: String,
    pub status: String,
    pub payload: serde_json::Value,
}

impl Progress {
    pub(crate) fn from_payload(requested_id: &str, payload: serde_json::Value) -> Self {
        let status = payload
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let snapshot_id = payload
            .get("snapshot_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(requested_id)
            .to_string();
        Self {
            snapshot_id,
            status,
            payload,
        }
    }
}

/// Output format for snapshot downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotFormat {
    #[default]
    Json,
    Ndjson,
}

impl SnapshotFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotFormat::Json => "json",
            SnapshotFormat::Ndjson => "ndjson",
        }
    }
}

/// Snapshot bodies come back either as a flat record array or wrapped in an
/// outer array (one inner array per input batch).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SnapshotBody<T> {
    Nested(Vec<Vec<T>>),
    Flat(Vec<T>),
}

impl<T> SnapshotBody<T> {
    pub(crate) fn into_records(self) -> Vec<T> {
        match self {
            SnapshotBody::Nested(batches) => batches.into_iter().flatten().collect(),
            SnapshotBody::Flat(records) => records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_input_serializes_dates_as_iso() {
        let input = TriggerInput {
            url: "https://shop.example/p/1".to_string(),
            num_of_posts: 10,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            order_by: "Latest".to_string(),
            country: String::new(),
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["start_date"], "2024-01-01");
        assert_eq!(json["end_date"], "2024-01-31");
        assert_eq!(json["num_of_posts"], 10);
    }

    #[test]
    fn progress_keeps_full_payload() {
        let payload = serde_json::json!({
            "status": "failed",
            "snapshot_id": "s_abc",
            "error": "blocked"
        });
        let progress = Progress::from_payload("s_abc", payload.clone());
        assert_eq!(progress.status, "failed");
        assert_eq!(progress.payload, payload);
    }

    #[test]
    fn progress_falls_back_to_requested_id() {
        let progress = Progress::from_payload("s_req", serde_json::json!({"status": "running"}));
        assert_eq!(progress.snapshot_id, "s_req");
    }

    #[test]
    fn snapshot_body_accepts_flat_and_nested() {
        let flat: SnapshotBody<serde_json::Value> =
            serde_json::from_str(r#"[{"id": "a"}, {"id": "b"}]"#).unwrap();
        assert_eq!(flat.into_records().len(), 2);

        let nested: SnapshotBody<serde_json::Value> =
            serde_json::from_str(r#"[[{"id": "a"}, {"id": "b"}, {"id": "c"}]]"#).unwrap();
        assert_eq!(nested.into_records().len(), 3);

        let empty: SnapshotBody<serde_json::Value> = serde_json::from_str("[]").unwrap();
        assert!(empty.into_records().is_empty());
    }
}
