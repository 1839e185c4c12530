use std::path::Path;

use anyhow::{Context, Result};

/// Default file name of the downloadable report.
pub const REPORT_FILE_NAME: &str = "product_analysis.md";

/// Output of one pipeline task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutput {
    pub agent: String,
    pub description: String,
    pub raw: String,
}

/// Result of the analysis pipeline. `raw` is the final task's text and is
/// the deliverable; `tasks` keeps every intermediate output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisReport {
    pub raw: String,
    pub tasks: Vec<TaskOutput>,
}

impl AnalysisReport {
    /// Write the report as Markdown, creating parent directories.
    pub fn write_markdown(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut body = self.raw.trim_end().to_string();
        body.push('\n');
        std::fs::write(path, body)
            .with_context(|| format!("Failed to write report: {}", path.display()))
    }
}
