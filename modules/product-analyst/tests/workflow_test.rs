//! End-to-end runs of the analysis workflow against in-memory mocks.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use product_analyst::descriptor::Descriptor;
use product_analyst::testing::{record, request, MockScraper, ScriptedRuntime, SAMPLE_PIPELINE};
use product_analyst::{
    AnalysisWorkflow, PipelineDefinition, PipelineRunner, PollSettings, RunEvent, WorkflowError,
    WorkflowSettings, REPORT_FILE_NAME,
};

fn settings(dir: &Path) -> WorkflowSettings {
    WorkflowSettings {
        descriptions_dir: dir.to_path_buf(),
        keep_runs: 5,
        poll: PollSettings {
            interval: Duration::from_millis(1),
            max_wait: Duration::from_secs(5),
            max_attempts: None,
        },
    }
}

fn workflow(
    scraper: Arc<MockScraper>,
    runtime: Arc<ScriptedRuntime>,
    settings: WorkflowSettings,
) -> AnalysisWorkflow {
    let definition = PipelineDefinition::from_toml_str(SAMPLE_PIPELINE).unwrap();
    let pipeline = PipelineRunner::new(Arc::new(definition), runtime);
    AnalysisWorkflow::new(scraper, pipeline, settings)
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    let Ok(runs) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files = Vec::new();
    for run in runs.flatten() {
        if run.path().is_dir() {
            for file in std::fs::read_dir(run.path()).unwrap().flatten() {
                files.push(file.path());
            }
        }
    }
    files.sort();
    files
}

#[tokio::test]
async fn ready_after_two_running_checks_produces_report() {
    let tmp = tempfile::tempdir().unwrap();
    let scraper = Arc::new(
        MockScraper::new("s_1")
            .statuses(&["running", "running", "ready"])
            .records(vec![
                record("p-1", "Trail Shoe", "$120"),
                record("p-2", "Road Shoe", "$95"),
            ]),
    );
    let runtime = Arc::new(ScriptedRuntime::new([
        "Notes on both shoes",
        "| shoe | price |",
        "# Competitive Analysis\n\nTrail Shoe costs more.",
    ]));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let recorder = move |event: &RunEvent| sink.lock().unwrap().push(event.clone());

    let ctx = workflow(scraper.clone(), runtime.clone(), settings(tmp.path()))
        .run(
            request(&["https://shop.example/trail", "https://shop.example/road"]),
            CancellationToken::new(),
            &recorder,
        )
        .await
        .unwrap();

    assert_eq!(scraper.trigger_calls(), 1);
    assert_eq!(scraper.status_calls(), 3);
    assert_eq!(scraper.fetch_calls(), 1);

    // Descriptors follow service order and are parseable.
    let paths: Vec<_> = ctx.manifest.paths().map(Path::to_path_buf).collect();
    assert_eq!(paths.len(), 2);
    assert!(paths[0].file_name().unwrap().to_string_lossy().starts_with("0000-"));
    assert!(paths[1].file_name().unwrap().to_string_lossy().starts_with("0001-"));
    let first = Descriptor::parse(&std::fs::read_to_string(&paths[0]).unwrap()).unwrap();
    assert_eq!(first.name, "Trail Shoe");
    assert_eq!(first.price, "$120");
    assert_eq!(first.features, vec!["Durable", "Lightweight"]);

    let report = ctx.report.unwrap();
    assert_eq!(report.raw, "# Competitive Analysis\n\nTrail Shoe costs more.");
    assert_eq!(report.tasks.len(), 3);

    let out = tmp.path().join(REPORT_FILE_NAME);
    report.write_markdown(&out).unwrap();
    assert!(std::fs::read_to_string(&out).unwrap().starts_with("# Competitive Analysis"));

    let events = events.lock().unwrap().clone();
    let statuses = events
        .iter()
        .filter(|e| matches!(e, RunEvent::Status { .. }))
        .count();
    assert_eq!(statuses, 2);
    assert!(matches!(events.first(), Some(RunEvent::Triggered { snapshot_id, .. }) if snapshot_id == "s_1"));
    assert!(matches!(events.last(), Some(RunEvent::Completed { .. })));
}

#[tokio::test]
async fn tasks_see_inputs_tools_and_previous_outputs() {
    let tmp = tempfile::tempdir().unwrap();
    let scraper = Arc::new(
        MockScraper::new("s_2")
            .statuses(&["ready"])
            .records(vec![record("p-1", "Lamp", "$30")]),
    );
    let runtime = Arc::new(ScriptedRuntime::new(["facts", "comparison", "report"]));

    let ctx = workflow(scraper, runtime.clone(), settings(tmp.path()))
        .run(
            request(&["https://shop.example/lamp"]),
            CancellationToken::new(),
            &product_analyst::LogObserver,
        )
        .await
        .unwrap();

    let turns = runtime.turns();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[0].role, "analyst");
    assert!(turns[0].prompt.contains(&ctx.manifest.joined()));
    assert!(turns[0].tools.get("read_file").is_some());
    assert!(turns[0].preamble.contains("outdoor gear"));

    assert!(turns[1].prompt.contains("Compare https://shop.example/lamp"));
    assert!(turns[1].prompt.contains("facts"));

    assert_eq!(turns[2].role, "synthesizer");
    assert!(turns[2].tools.is_empty());
    assert!(turns[2].preamble.starts_with("You are Report Writer."));
    assert!(turns[2].prompt.contains("facts"));
    assert!(turns[2].prompt.contains("comparison"));
}

#[tokio::test]
async fn failed_job_stops_before_fetch() {
    let tmp = tempfile::tempdir().unwrap();
    let scraper = Arc::new(MockScraper::new("s_3").statuses(&["failed"]));
    let runtime = Arc::new(ScriptedRuntime::new(["unused"]));

    let err = workflow(scraper.clone(), runtime.clone(), settings(tmp.path()))
        .run(
            request(&["https://shop.example/a"]),
            CancellationToken::new(),
            &product_analyst::LogObserver,
        )
        .await
        .unwrap_err();

    match err {
        WorkflowError::JobFailed {
            snapshot_id,
            payload,
        } => {
            assert_eq!(snapshot_id, "s_3");
            assert!(payload.contains("failed"));
        }
        other => panic!("expected JobFailed, got {other:?}"),
    }
    assert_eq!(scraper.status_calls(), 1);
    assert_eq!(scraper.fetch_calls(), 0);
    assert!(runtime.turns().is_empty());
    assert!(files_under(tmp.path()).is_empty());
}

#[tokio::test]
async fn rejected_trigger_is_not_retried() {
    let tmp = tempfile::tempdir().unwrap();
    let scraper = Arc::new(MockScraper::rejecting("401 unauthorized"));
    let runtime = Arc::new(ScriptedRuntime::new(["unused"]));

    let err = workflow(scraper.clone(), runtime, settings(tmp.path()))
        .run(
            request(&["https://shop.example/a"]),
            CancellationToken::new(),
            &product_analyst::LogObserver,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Trigger(_)));
    assert_eq!(scraper.trigger_calls(), 1);
    assert_eq!(scraper.status_calls(), 0);
}

#[tokio::test]
async fn attempt_cap_times_out() {
    let tmp = tempfile::tempdir().unwrap();
    let scraper = Arc::new(MockScraper::new("s_4"));
    let runtime = Arc::new(ScriptedRuntime::new(["unused"]));
    let mut settings = settings(tmp.path());
    settings.poll.max_attempts = Some(3);

    let err = workflow(scraper.clone(), runtime, settings)
        .run(
            request(&["https://shop.example/a"]),
            CancellationToken::new(),
            &product_analyst::LogObserver,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::TimedOut { attempts: 3, .. }));
    assert_eq!(scraper.status_calls(), 3);
    assert_eq!(scraper.fetch_calls(), 0);
}

#[tokio::test]
async fn cancellation_stops_polling() {
    let tmp = tempfile::tempdir().unwrap();
    let scraper = Arc::new(MockScraper::new("s_5"));
    let runtime = Arc::new(ScriptedRuntime::new(["unused"]));
    let mut settings = settings(tmp.path());
    settings.poll.interval = Duration::from_secs(60);
    settings.poll.max_wait = Duration::from_secs(600);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let observer = move |event: &RunEvent| {
        if matches!(event, RunEvent::Status { .. }) {
            trigger.cancel();
        }
    };

    let err = workflow(scraper.clone(), runtime, settings)
        .run(request(&["https://shop.example/a"]), cancel, &observer)
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Cancelled { ref snapshot_id } if snapshot_id == "s_5"));
    assert_eq!(scraper.status_calls(), 1);
    assert!(files_under(tmp.path()).is_empty());
}

#[tokio::test]
async fn empty_snapshot_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let scraper = Arc::new(MockScraper::new("s_6").statuses(&["ready"]));
    let runtime = Arc::new(ScriptedRuntime::new(["unused"]));

    let err = workflow(scraper, runtime.clone(), settings(tmp.path()))
        .run(
            request(&["https://shop.example/a"]),
            CancellationToken::new(),
            &product_analyst::LogObserver,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::NoRecords { .. }));
    assert_eq!(err.kind(), "no_records");
    assert!(runtime.turns().is_empty());
}

#[tokio::test]
async fn fetch_failure_is_reported_with_snapshot_id() {
    let tmp = tempfile::tempdir().unwrap();
    let scraper = Arc::new(
        MockScraper::new("s_7")
            .statuses(&["ready"])
            .failing_fetch("connection reset"),
    );
    let runtime = Arc::new(ScriptedRuntime::new(["unused"]));

    let err = workflow(scraper, runtime, settings(tmp.path()))
        .run(
            request(&["https://shop.example/a"]),
            CancellationToken::new(),
            &product_analyst::LogObserver,
        )
        .await
        .unwrap_err();

    match err {
        WorkflowError::Fetch {
            snapshot_id,
            source,
        } => {
            assert_eq!(snapshot_id, "s_7");
            assert!(source.to_string().contains("connection reset"));
        }
        other => panic!("expected Fetch, got {other:?}"),
    }
}

#[tokio::test]
async fn failing_task_aborts_without_report() {
    let tmp = tempfile::tempdir().unwrap();
    let scraper = Arc::new(
        MockScraper::new("s_8")
            .statuses(&["ready"])
            .records(vec![record("p-1", "Lamp", "$30")]),
    );
    let runtime = Arc::new(ScriptedRuntime::new(["facts", "unused", "unused"]).failing_at(1));

    let err = workflow(scraper, runtime.clone(), settings(tmp.path()))
        .run(
            request(&["https://shop.example/lamp"]),
            CancellationToken::new(),
            &product_analyst::LogObserver,
        )
        .await
        .unwrap_err();

    match err {
        WorkflowError::Pipeline { task, agent, .. } => {
            assert_eq!(task, 2);
            assert_eq!(agent, "comparison");
        }
        other => panic!("expected Pipeline, got {other:?}"),
    }
    assert_eq!(runtime.turns().len(), 2);
    assert!(!tmp.path().join(REPORT_FILE_NAME).exists());
}

#[tokio::test]
async fn empty_final_output_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let scraper = Arc::new(
        MockScraper::new("s_9")
            .statuses(&["ready"])
            .records(vec![record("p-1", "Lamp", "$30")]),
    );
    let runtime = Arc::new(ScriptedRuntime::new(["facts", "table", "   "]));

    let err = workflow(scraper, runtime, settings(tmp.path()))
        .run(
            request(&["https://shop.example/lamp"]),
            CancellationToken::new(),
            &product_analyst::LogObserver,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Pipeline { task: 3, .. }));
}

#[tokio::test]
async fn concurrent_runs_write_separate_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let make = || {
        let scraper = Arc::new(
            MockScraper::new("s_10")
                .statuses(&["ready"])
                .records(vec![record("same-id", "Lamp", "$30")]),
        );
        let runtime = Arc::new(ScriptedRuntime::new(["a", "b", "report"]));
        workflow(scraper, runtime, settings(tmp.path()))
    };
    let (w1, w2) = (make(), make());

    let (a, b) = tokio::join!(
        w1.run(
            request(&["https://shop.example/a"]),
            CancellationToken::new(),
            &product_analyst::LogObserver,
        ),
        w2.run(
            request(&["https://shop.example/a"]),
            CancellationToken::new(),
            &product_analyst::LogObserver,
        ),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.run_id, b.run_id);
    assert_ne!(a.manifest.joined(), b.manifest.joined());
    assert_eq!(files_under(tmp.path()).len(), 2);
}

#[test]
fn blank_targets_are_rejected_before_any_call() {
    let result = product_analyst::ScrapeRequest::new(
        ["", "   "],
        10,
        product_analyst::DateRange::parse("2024-01-01", "2024-01-02").unwrap(),
        product_analyst::SortOrder::Latest,
        "",
    );
    assert!(matches!(result, Err(WorkflowError::InvalidRequest(_))));
}

#[test]
fn unknown_agent_in_definition_is_rejected() {
    let broken = SAMPLE_PIPELINE.replace("agent = \"synthesizer\"", "agent = \"writer\"");
    let err = PipelineDefinition::from_toml_str(&broken).unwrap_err();
    assert!(format!("{err:#}").contains("writer"));
}

#[test]
fn bundled_pipeline_definition_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/pipeline.toml");
    let definition = PipelineDefinition::load(&path).unwrap();
    assert_eq!(definition.tasks().len(), 3);
    assert!(definition.agents().any(|(role, _)| role == "synthesizer"));
}

#[test]
fn bundled_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/product-analyst.toml");
    let config = product_analyst::file_config::load_config(&path).unwrap();
    assert_eq!(config.pipeline.definition, PathBuf::from("pipeline.toml"));
    assert_eq!(config.output.report_path, PathBuf::from(REPORT_FILE_NAME));
}
