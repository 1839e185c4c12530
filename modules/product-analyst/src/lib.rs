//! Competitor product analysis: scrape product pages through Bright Data,
//! write one descriptor file per product, and run a multi-agent LLM
//! pipeline over the descriptors to produce a Markdown report.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod file_config;
pub mod materializer;
pub mod observer;
pub mod pipeline;
pub mod poller;
pub mod report;
pub mod scrape;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod trigger;
pub mod types;
pub mod workflow;

pub use config::AppConfig;
pub use error::WorkflowError;
pub use file_config::FileConfig;
pub use materializer::Manifest;
pub use observer::{LogObserver, RunEvent, RunObserver};
pub use pipeline::{PipelineDefinition, PipelineInputs, PipelineRunner};
pub use poller::PollSettings;
pub use report::{AnalysisReport, REPORT_FILE_NAME};
pub use scrape::{BrightDataScraper, ScrapeService};
pub use types::{DateRange, JobHandle, JobState, ResultRecord, RunId, ScrapeRequest, SortOrder};
pub use workflow::{AnalysisWorkflow, RunContext, WorkflowSettings};
