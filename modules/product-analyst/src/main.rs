use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use brightdata_client::BrightDataClient;
use llm_client::{ChatAgent, ChatClient};
use product_analyst::file_config::{load_config, relative_to_config};
use product_analyst::{
    AnalysisWorkflow, AppConfig, BrightDataScraper, DateRange, LogObserver, PipelineDefinition,
    PipelineRunner, RunEvent, RunObserver, ScrapeRequest, WorkflowSettings,
};

#[derive(Parser)]
#[command(
    name = "product-analyst",
    about = "Scrape competitor products and write a comparative analysis report"
)]
struct Cli {
    /// Product page URL to analyze (repeat for each competitor)
    #[arg(long = "url", value_name = "URL", required = true)]
    urls: Vec<String>,

    /// Start of the date range (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// End of the date range (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Path to config TOML file
    #[arg(long, default_value = "./config/product-analyst.toml")]
    config: PathBuf,

    /// Override `[scraper] limit`
    #[arg(long)]
    limit: Option<u32>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("product_analyst=info"));
    if cli.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config_path = cli.config.canonicalize().with_context(|| {
        format!(
            "Config file not found: {}. Create one or specify --config <path>",
            cli.config.display()
        )
    })?;
    tracing::info!(config = %config_path.display(), "Loading config");

    let file_config = load_config(&config_path)?;
    let app_config = AppConfig::from_env()?;

    let definition_path = relative_to_config(&config_path, &file_config.pipeline.definition);
    let definition = PipelineDefinition::load(&definition_path)?;
    tracing::info!(
        tasks = definition.tasks().len(),
        definition = %definition_path.display(),
        "Pipeline definition loaded"
    );

    let today = Local::now().date_naive();
    let date_range = DateRange::new(cli.start.unwrap_or(today), cli.end.unwrap_or(today))?;
    let scraper_config = &file_config.scraper;
    let request = ScrapeRequest::new(
        cli.urls,
        cli.limit.unwrap_or(scraper_config.limit),
        date_range,
        scraper_config.sort_order,
        scraper_config.extra_filter.clone(),
    )?;

    let client = BrightDataClient::with_timeout(
        app_config.bright_data_api_key.clone(),
        scraper_config.request_timeout(),
    )?
    .with_base_url(scraper_config.base_url.clone());
    let scraper = BrightDataScraper::new(client, scraper_config.dataset_id.clone());

    let llm = &file_config.llm;
    let mut chat = ChatClient::new(app_config.deepseek_api_key.clone())
        .with_timeout(std::time::Duration::from_secs(llm.request_timeout_secs))?;
    if let Some(base_url) = app_config.llm_base_url.as_ref().or(llm.base_url.as_ref()) {
        chat = chat.with_base_url(base_url.clone());
    }
    let mut agent = ChatAgent::new(chat, llm.model.clone()).temperature(llm.temperature);
    if let Some(max_tokens) = llm.max_tokens {
        agent = agent.max_tokens(max_tokens);
    }

    let pipeline = PipelineRunner::new(Arc::new(definition), Arc::new(agent))
        .with_max_turns(llm.max_turns)
        .with_max_file_bytes(file_config.pipeline.max_file_bytes);

    let settings = WorkflowSettings {
        descriptions_dir: file_config.output.descriptions_dir.clone(),
        keep_runs: file_config.output.keep_runs,
        poll: scraper_config.poll_settings(),
    };
    let workflow = AnalysisWorkflow::new(Arc::new(scraper), pipeline, settings);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            ctrl_c.cancel();
        }
    });

    let observer = |event: &RunEvent| {
        LogObserver.on_event(event);
        if let Some(line) = progress_line(event) {
            println!("{line}");
        }
    };

    let ctx = match workflow.run(request, cancel, &observer).await {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("Analysis failed ({}): {err}", err.kind());
            std::process::exit(1);
        }
    };

    let report = ctx
        .report
        .context("Run finished without producing a report")?;
    report.write_markdown(&file_config.output.report_path)?;
    println!(
        "Report written to {} ({} products analyzed)",
        file_config.output.report_path.display(),
        ctx.manifest.len()
    );
    Ok(())
}

fn progress_line(event: &RunEvent) -> Option<String> {
    let line = match event {
        RunEvent::Triggered { snapshot_id, .. } => {
            format!("Scrape job started (snapshot {snapshot_id})")
        }
        RunEvent::Status { state, attempt, .. } => {
            format!("Waiting for scrape job: {state} (check {attempt})")
        }
        RunEvent::ScrapeReady { .. } => "Scrape job ready".to_string(),
        RunEvent::RecordsFetched { count } => format!("Fetched {count} products"),
        RunEvent::Materialized { count, dir } => {
            format!("Wrote {count} descriptors to {}", dir.display())
        }
        RunEvent::TaskStarted {
            index,
            total,
            agent,
        } => format!("Task {}/{total}: {agent}", index + 1),
        RunEvent::TaskFinished { .. } => return None,
        RunEvent::Completed { .. } => "Analysis complete".to_string(),
    };
    Some(line)
}
