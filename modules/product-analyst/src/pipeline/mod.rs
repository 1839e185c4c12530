//! Configuration-driven multi-agent analysis.
//!
//! A [`PipelineDefinition`] names agents (role key → goal, backstory,
//! capabilities) and an ordered task list. [`PipelineRunner`] executes the
//! tasks strictly in sequence through an [`AgentRuntime`], feeding each
//! task the outputs of the ones before it.

pub mod definition;
pub mod read_file;
pub mod runner;
pub mod template;

use std::collections::HashMap;

pub use definition::{AgentSpec, Capability, PipelineDefinition, TaskSpec};
pub use read_file::ReadFileTool;
pub use runner::{AgentRuntime, AgentTurn, PipelineRunner};

use crate::materializer::Manifest;
use crate::types::ScrapeRequest;

/// Runtime variables a task template may reference.
pub const RUNTIME_VARS: &[&str] = &["file_paths", "products"];

/// The single input document of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineInputs {
    /// Descriptor paths, comma-and-space joined, in manifest order.
    pub file_paths: String,
    /// The product URLs being compared, comma-and-space joined.
    pub products: String,
}

impl PipelineInputs {
    pub fn new(manifest: &Manifest, request: &ScrapeRequest) -> Self {
        Self {
            file_paths: manifest.joined(),
            products: request.targets().join(", "),
        }
    }

    pub(crate) fn vars(&self) -> HashMap<&str, &str> {
        HashMap::from([
            ("file_paths", self.file_paths.as_str()),
            ("products", self.products.as_str()),
        ])
    }
}
