use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::warn;

use super::template::resolve_config_vars;
use super::RUNTIME_VARS;

/// What an agent may do besides talking to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read the descriptor files of the current run.
    ReadFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSpec {
    /// Display name used in the agent's preamble. Defaults to the role key.
    #[serde(default)]
    pub title: Option<String>,
    pub goal: String,
    pub backstory: String,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

impl AgentSpec {
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskSpec {
    pub description: String,
    pub expected_output: String,
    /// Role key of the agent that performs this task.
    pub agent: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDefinition {
    /// Free-form values for `{{config.*}}` substitution.
    #[serde(default)]
    #[allow(dead_code)]
    context: Option<toml::Table>,
    agents: BTreeMap<String, AgentSpec>,
    tasks: Vec<TaskSpec>,
}

/// Validated agent and task wiring, with `{{config.*}}` already resolved.
#[derive(Debug, Clone)]
pub struct PipelineDefinition {
    agents: BTreeMap<String, AgentSpec>,
    tasks: Vec<TaskSpec>,
}

impl PipelineDefinition {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline definition: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid pipeline definition: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let doc: toml::Value = content.parse().context("Failed to parse TOML")?;
        let raw: RawDefinition = doc.clone().try_into()?;
        Self::validate(raw, &doc)
    }

    fn validate(raw: RawDefinition, doc: &toml::Value) -> Result<Self> {
        if raw.agents.is_empty() {
            bail!("Pipeline defines no agents");
        }
        if raw.tasks.is_empty() {
            bail!("Pipeline defines no tasks");
        }

        let mut agents = BTreeMap::new();
        for (role, spec) in raw.agents {
            if spec.goal.trim().is_empty() || spec.backstory.trim().is_empty() {
                bail!("Agent '{role}' needs a non-empty goal and backstory");
            }
            let spec = AgentSpec {
                goal: resolve_config_vars(&spec.goal, doc, RUNTIME_VARS)
                    .with_context(|| format!("Agent '{role}' goal"))?,
                backstory: resolve_config_vars(&spec.backstory, doc, RUNTIME_VARS)
                    .with_context(|| format!("Agent '{role}' backstory"))?,
                ..spec
            };
            agents.insert(role, spec);
        }

        let mut tasks = Vec::with_capacity(raw.tasks.len());
        for (i, task) in raw.tasks.into_iter().enumerate() {
            let n = i + 1;
            if !agents.contains_key(&task.agent) {
                bail!(
                    "Task {n} references unknown agent '{}'; defined agents: {:?}",
                    task.agent,
                    agents.keys().collect::<Vec<_>>()
                );
            }
            if task.description.trim().is_empty() || task.expected_output.trim().is_empty() {
                bail!("Task {n} needs a non-empty description and expected_output");
            }
            tasks.push(TaskSpec {
                description: resolve_config_vars(&task.description, doc, RUNTIME_VARS)
                    .with_context(|| format!("Task {n} description"))?,
                expected_output: resolve_config_vars(&task.expected_output, doc, RUNTIME_VARS)
                    .with_context(|| format!("Task {n} expected_output"))?,
                agent: task.agent,
            });
        }

        for role in agents.keys() {
            if !tasks.iter().any(|t| &t.agent == role) {
                warn!(agent = role.as_str(), "Agent is defined but no task uses it");
            }
        }

        Ok(Self { agents, tasks })
    }

    pub fn agent(&self, role: &str) -> Option<&AgentSpec> {
        self.agents.get(role)
    }

    pub fn agents(&self) -> impl Iterator<Item = (&str, &AgentSpec)> {
        self.agents.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }
}
