// In-memory mocks for the two trait boundaries of a run:
// - MockScraper (ScrapeService): scripted status sequence, fixed records
// - ScriptedRuntime (AgentRuntime): canned task outputs, records every turn
//
// Plus small builders for requests and records.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::json;

use crate::pipeline::{AgentRuntime, AgentTurn};
use crate::scrape::ScrapeService;
use crate::types::{DateRange, JobState, JobStatus, ResultRecord, ScrapeRequest, SortOrder};

// ---------------------------------------------------------------------------
// MockScraper
// ---------------------------------------------------------------------------

/// Scrape service that answers from a script.
///
/// Status calls pop from the queue; once it is empty the last status
/// repeats. An empty script reports `running` forever.
pub struct MockScraper {
    snapshot_id: Result<String, String>,
    statuses: Mutex<VecDeque<&'static str>>,
    last_status: Mutex<&'static str>,
    records: Vec<ResultRecord>,
    fetch_error: Option<String>,
    trigger_calls: AtomicUsize,
    status_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MockScraper {
    pub fn new(snapshot_id: &str) -> Self {
        Self {
            snapshot_id: Ok(snapshot_id.to_string()),
            statuses: Mutex::new(VecDeque::new()),
            last_status: Mutex::new("running"),
            records: Vec::new(),
            fetch_error: None,
            trigger_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Make `trigger` fail with `message`.
    pub fn rejecting(message: &str) -> Self {
        let mut mock = Self::new("");
        mock.snapshot_id = Err(message.to_string());
        mock
    }

    pub fn statuses(self, statuses: &[&'static str]) -> Self {
        *self.statuses.lock().unwrap() = statuses.iter().copied().collect();
        self
    }

    pub fn records(mut self, records: Vec<ResultRecord>) -> Self {
        self.records = records;
        self
    }

    pub fn failing_fetch(mut self, message: &str) -> Self {
        self.fetch_error = Some(message.to_string());
        self
    }

    pub fn trigger_calls(&self) -> usize {
        self.trigger_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScrapeService for MockScraper {
    async fn trigger(&self, _request: &ScrapeRequest) -> Result<String> {
        self.trigger_calls.fetch_add(1, Ordering::SeqCst);
        self.snapshot_id.clone().map_err(|m| anyhow!(m))
    }

    async fn status(&self, snapshot_id: &str) -> Result<JobStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let status = {
            let mut queue = self.statuses.lock().unwrap();
            let mut last = self.last_status.lock().unwrap();
            if let Some(next) = queue.pop_front() {
                *last = next;
            }
            *last
        };
        Ok(JobStatus {
            snapshot_id: snapshot_id.to_string(),
            state: JobState::from_wire(status),
            payload: json!({ "snapshot_id": snapshot_id, "status": status }),
        })
    }

    async fn fetch(&self, _snapshot_id: &str) -> Result<Vec<ResultRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fetch_error {
            bail!("{message}");
        }
        Ok(self.records.clone())
    }
}

// ---------------------------------------------------------------------------
// ScriptedRuntime
// ---------------------------------------------------------------------------

/// Agent runtime returning canned outputs in task order. Running out of
/// outputs is an error. A `None` entry fails that task.
pub struct ScriptedRuntime {
    outputs: Mutex<VecDeque<Option<String>>>,
    turns: Mutex<Vec<AgentTurn>>,
}

impl ScriptedRuntime {
    pub fn new<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outputs: Mutex::new(outputs.into_iter().map(|s| Some(s.into())).collect()),
            turns: Mutex::new(Vec::new()),
        }
    }

    /// Fail the task at `index` (0-based) instead of answering it.
    pub fn failing_at(self, index: usize) -> Self {
        {
            let mut outputs = self.outputs.lock().unwrap();
            while outputs.len() <= index {
                outputs.push_back(Some(String::new()));
            }
            outputs[index] = None;
        }
        self
    }

    /// Every turn executed so far, in order.
    pub fn turns(&self) -> Vec<AgentTurn> {
        self.turns.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn execute(&self, turn: AgentTurn) -> Result<String> {
        let role = turn.role.clone();
        self.turns.lock().unwrap().push(turn);
        match self.outputs.lock().unwrap().pop_front() {
            Some(Some(output)) => Ok(output),
            Some(None) => bail!("model call failed for {role}"),
            None => bail!("no scripted output left for {role}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn request(targets: &[&str]) -> ScrapeRequest {
    ScrapeRequest::new(
        targets.iter().copied(),
        10,
        DateRange::parse("2024-01-01", "2024-01-31").unwrap(),
        SortOrder::Latest,
        "US",
    )
    .unwrap()
}

pub fn record(id: &str, name: &str, price: &str) -> ResultRecord {
    ResultRecord {
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        price: Some(price.to_string()),
        description: Some(format!("{name} description")),
        features: vec!["Durable".to_string(), "Lightweight".to_string()],
        image_url: None,
    }
}

/// Three-agent, three-task pipeline used across workflow tests.
pub const SAMPLE_PIPELINE: &str = r#"
[context]
market = "outdoor gear"

[agents.analyst]
goal = "Extract key facts from each descriptor"
backstory = "You read product sheets for {{config.context.market}} retailers."
capabilities = ["read_file"]

[agents.comparison]
goal = "Compare the products"
backstory = "You compare competing products."
capabilities = ["read_file"]

[agents.synthesizer]
title = "Report Writer"
goal = "Write the final report"
backstory = "You write concise Markdown reports."

[[tasks]]
description = "Read these files: {{file_paths}}"
expected_output = "Per-product notes"
agent = "analyst"

[[tasks]]
description = "Compare {{products}}"
expected_output = "A comparison table"
agent = "comparison"

[[tasks]]
description = "Write the report"
expected_output = "Markdown report"
agent = "synthesizer"
"#;
