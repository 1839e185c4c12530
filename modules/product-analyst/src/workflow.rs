use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::WorkflowError;
use crate::materializer::{materialize, prune_stale_runs, run_dir, Manifest};
use crate::observer::{RunEvent, RunObserver};
use crate::pipeline::{PipelineInputs, PipelineRunner};
use crate::poller::{PollSettings, Poller};
use crate::report::AnalysisReport;
use crate::scrape::ScrapeService;
use crate::trigger::trigger;
use crate::types::{JobHandle, ResultRecord, RunId, ScrapeRequest};

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Root directory for descriptor files; each run writes to a
    /// sub-directory named after its run id.
    pub descriptions_dir: PathBuf,
    /// How many run directories to keep after a successful run.
    pub keep_runs: usize,
    pub poll: PollSettings,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            descriptions_dir: PathBuf::from("descriptions"),
            keep_runs: 5,
            poll: PollSettings::default(),
        }
    }
}

/// State of one run. Built fresh for every run and filled in stage by
/// stage; nothing outlives the run except the files it wrote.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    pub request: ScrapeRequest,
    pub handle: Option<JobHandle>,
    pub records: Vec<ResultRecord>,
    pub manifest: Manifest,
    pub report: Option<AnalysisReport>,
}

impl RunContext {
    pub fn new(request: ScrapeRequest) -> Self {
        Self {
            run_id: RunId::new(),
            request,
            handle: None,
            records: Vec::new(),
            manifest: Manifest::default(),
            report: None,
        }
    }
}

/// Trigger → poll → materialize → analyze.
pub struct AnalysisWorkflow {
    scraper: Arc<dyn ScrapeService>,
    pipeline: PipelineRunner,
    settings: WorkflowSettings,
}

impl AnalysisWorkflow {
    pub fn new(
        scraper: Arc<dyn ScrapeService>,
        pipeline: PipelineRunner,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            scraper,
            pipeline,
            settings,
        }
    }

    /// Run all four stages for `request`. Returns the completed context, or
    /// the first stage error. A failed or cancelled scrape job leaves no
    /// descriptor files behind.
    pub async fn run(
        &self,
        request: ScrapeRequest,
        cancel: CancellationToken,
        observer: &dyn RunObserver,
    ) -> Result<RunContext, WorkflowError> {
        let mut ctx = RunContext::new(request);
        info!(run_id = %ctx.run_id, targets = ctx.request.targets().len(), "Starting analysis run");

        let result = self.run_stages(&mut ctx, &cancel, observer).await;
        match &result {
            Ok(()) => {
                observer.on_event(&RunEvent::Completed { run_id: ctx.run_id });
                self.prune(ctx.run_id);
            }
            Err(err) => warn!(run_id = %ctx.run_id, kind = err.kind(), error = %err, "Run failed"),
        }
        result.map(|()| ctx)
    }

    async fn run_stages(
        &self,
        ctx: &mut RunContext,
        cancel: &CancellationToken,
        observer: &dyn RunObserver,
    ) -> Result<(), WorkflowError> {
        let handle = trigger(self.scraper.as_ref(), &ctx.request).await?;
        observer.on_event(&RunEvent::Triggered {
            run_id: ctx.run_id,
            snapshot_id: handle.snapshot_id().to_string(),
        });
        ctx.handle = Some(handle.clone());

        let poller = Poller::new(
            self.scraper.as_ref(),
            self.settings.poll.clone(),
            cancel.clone(),
        );
        let ready = poller.wait_until_ready(&handle, observer).await?;
        observer.on_event(&RunEvent::ScrapeReady {
            snapshot_id: ready.snapshot_id.clone(),
        });

        let records = self
            .scraper
            .fetch(handle.snapshot_id())
            .await
            .map_err(|source| WorkflowError::Fetch {
                snapshot_id: handle.snapshot_id().to_string(),
                source,
            })?;
        observer.on_event(&RunEvent::RecordsFetched {
            count: records.len(),
        });
        if records.is_empty() {
            return Err(WorkflowError::NoRecords {
                snapshot_id: handle.snapshot_id().to_string(),
            });
        }

        let manifest = materialize(&self.settings.descriptions_dir, ctx.run_id, &records)?;
        observer.on_event(&RunEvent::Materialized {
            count: manifest.len(),
            dir: run_dir(&self.settings.descriptions_dir, ctx.run_id),
        });
        ctx.records = records;
        ctx.manifest = manifest;

        if cancel.is_cancelled() {
            let dir = run_dir(&self.settings.descriptions_dir, ctx.run_id);
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                warn!(dir = %dir.display(), error = %e, "Failed to remove descriptors of cancelled run");
            }
            ctx.manifest = Manifest::default();
            return Err(WorkflowError::Cancelled {
                snapshot_id: handle.snapshot_id().to_string(),
            });
        }

        let inputs = PipelineInputs::new(&ctx.manifest, &ctx.request);
        let report = self.pipeline.run(&inputs, &ctx.manifest, observer).await?;
        ctx.report = Some(report);
        Ok(())
    }

    fn prune(&self, current: RunId) {
        match prune_stale_runs(&self.settings.descriptions_dir, self.settings.keep_runs, current) {
            Ok(0) => {}
            Ok(removed) => info!(removed, "Pruned stale descriptor directories"),
            Err(e) => warn!(error = %e, "Failed to prune stale descriptor directories"),
        }
    }
}
