use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::poller::PollSettings;
use crate::report::REPORT_FILE_NAME;
use crate::types::SortOrder;

/// TOML-backed configuration loaded from disk.
/// Secrets (API keys) stay as env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScraperConfig {
    pub dataset_id: String,
    #[serde(default = "default_scraper_base_url")]
    pub base_url: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default = "default_extra_filter")]
    pub extra_filter: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ScraperConfig {
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_wait: Duration::from_secs(self.max_wait_secs),
            max_attempts: self.max_attempts,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_llm_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            temperature: default_temperature(),
            max_tokens: None,
            max_turns: default_max_turns(),
            request_timeout_secs: default_llm_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_descriptions_dir")]
    pub descriptions_dir: PathBuf,
    #[serde(default = "default_keep_runs")]
    pub keep_runs: usize,
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            descriptions_dir: default_descriptions_dir(),
            keep_runs: default_keep_runs(),
            report_path: default_report_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Pipeline definition file, relative to the config file.
    pub definition: PathBuf,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
}

fn default_scraper_base_url() -> String {
    brightdata_client::BRIGHT_DATA_API_URL.to_string()
}
fn default_limit() -> u32 {
    10
}
fn default_extra_filter() -> String {
    "US".to_string()
}
fn default_poll_interval_secs() -> u64 {
    10
}
fn default_max_wait_secs() -> u64 {
    30 * 60
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_model() -> String {
    "deepseek-chat".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_turns() -> usize {
    8
}
fn default_llm_timeout_secs() -> u64 {
    180
}
fn default_descriptions_dir() -> PathBuf {
    PathBuf::from("descriptions")
}
fn default_keep_runs() -> usize {
    5
}
fn default_report_path() -> PathBuf {
    PathBuf::from(REPORT_FILE_NAME)
}
fn default_max_file_bytes() -> usize {
    64 * 1024
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    if config.scraper.dataset_id.trim().is_empty() {
        anyhow::bail!("[scraper] dataset_id must not be empty");
    }
    if config.scraper.limit == 0 {
        anyhow::bail!("[scraper] limit must be at least 1");
    }
    if config.scraper.poll_interval_secs == 0 {
        anyhow::bail!("[scraper] poll_interval_secs must be at least 1");
    }
    Ok(config)
}

/// Resolve `path` against the directory of `config_path` unless absolute.
pub fn relative_to_config(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match config_path.parent() {
        Some(dir) => dir.join(path),
        None => path.to_path_buf(),
    }
}
