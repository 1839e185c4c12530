use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use llm_client::{ChatAgent, ToolSet};
use tracing::{debug, info};

use super::definition::{AgentSpec, Capability, PipelineDefinition, TaskSpec};
use super::read_file::ReadFileTool;
use super::template::render;
use super::PipelineInputs;
use crate::error::WorkflowError;
use crate::materializer::Manifest;
use crate::observer::{RunEvent, RunObserver};
use crate::report::{AnalysisReport, TaskOutput};

const CONTEXT_SEPARATOR: &str = "\n\n----------\n\n";

/// Everything one agent needs to perform one task.
#[derive(Debug, Clone)]
pub struct AgentTurn {
    pub role: String,
    pub preamble: String,
    pub prompt: String,
    pub tools: ToolSet,
    pub max_turns: usize,
}

/// Executes a single agent turn against a model.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn execute(&self, turn: AgentTurn) -> Result<String>;
}

#[async_trait]
impl AgentRuntime for ChatAgent {
    async fn execute(&self, turn: AgentTurn) -> Result<String> {
        let agent = self.clone().with_tools(turn.tools);
        let text = agent
            .prompt(turn.prompt)
            .preamble(turn.preamble)
            .multi_turn(turn.max_turns)
            .send()
            .await?;
        Ok(text)
    }
}

pub struct PipelineRunner {
    definition: Arc<PipelineDefinition>,
    runtime: Arc<dyn AgentRuntime>,
    max_turns: usize,
    max_file_bytes: usize,
}

impl PipelineRunner {
    pub fn new(definition: Arc<PipelineDefinition>, runtime: Arc<dyn AgentRuntime>) -> Self {
        Self {
            definition,
            runtime,
            max_turns: 8,
            max_file_bytes: 64 * 1024,
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_max_file_bytes(mut self, max_file_bytes: usize) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    /// Run every task in order. The first failing task aborts the run; no
    /// partial report is returned.
    pub async fn run(
        &self,
        inputs: &PipelineInputs,
        manifest: &Manifest,
        observer: &dyn RunObserver,
    ) -> Result<AnalysisReport, WorkflowError> {
        let vars = inputs.vars();
        let read_file = ReadFileTool::for_manifest(manifest, self.max_file_bytes);
        let tasks = self.definition.tasks();
        let mut outputs: Vec<TaskOutput> = Vec::with_capacity(tasks.len());

        for (index, task) in tasks.iter().enumerate() {
            let fail = |source: anyhow::Error| WorkflowError::Pipeline {
                task: index + 1,
                agent: task.agent.clone(),
                source,
            };

            let agent = self
                .definition
                .agent(&task.agent)
                .ok_or_else(|| fail(anyhow!("agent '{}' is not defined", task.agent)))?;

            observer.on_event(&RunEvent::TaskStarted {
                index,
                total: tasks.len(),
                agent: task.agent.clone(),
            });

            let mut tools = ToolSet::new();
            if agent.can(Capability::ReadFile) {
                tools = tools.with(read_file.clone());
            }

            let turn = AgentTurn {
                role: task.agent.clone(),
                preamble: render(&preamble(&task.agent, agent), &vars),
                prompt: task_prompt(task, &vars, &outputs),
                tools,
                max_turns: self.max_turns,
            };
            debug!(task = index + 1, agent = %task.agent, prompt_len = turn.prompt.len(), "Executing task");

            let raw = self.runtime.execute(turn).await.map_err(fail)?;

            observer.on_event(&RunEvent::TaskFinished {
                index,
                agent: task.agent.clone(),
            });
            outputs.push(TaskOutput {
                agent: task.agent.clone(),
                description: task.description.clone(),
                raw,
            });
        }

        let raw = outputs.last().map(|o| o.raw.clone()).unwrap_or_default();
        if raw.trim().is_empty() {
            let last = tasks.len();
            return Err(WorkflowError::Pipeline {
                task: last,
                agent: tasks.last().map(|t| t.agent.clone()).unwrap_or_default(),
                source: anyhow!("final task produced an empty report"),
            });
        }

        info!(tasks = outputs.len(), report_len = raw.len(), "Analysis pipeline finished");
        Ok(AnalysisReport {
            raw,
            tasks: outputs,
        })
    }
}

fn preamble(role: &str, agent: &AgentSpec) -> String {
    let title = agent.title.as_deref().unwrap_or(role);
    format!(
        "You are {title}. {}\nYour personal goal is: {}",
        agent.backstory.trim(),
        agent.goal.trim()
    )
}

fn task_prompt(
    task: &TaskSpec,
    vars: &std::collections::HashMap<&str, &str>,
    previous: &[TaskOutput],
) -> String {
    let mut prompt = render(task.description.trim(), vars);
    prompt.push_str("\n\nThis is the expected criteria for your final answer: ");
    prompt.push_str(&render(task.expected_output.trim(), vars));
    prompt.push_str(
        "\nYou MUST return the actual complete content as the final answer, not a summary.",
    );

    if !previous.is_empty() {
        prompt.push_str("\n\nThis is the context you're working with:\n");
        let context = previous
            .iter()
            .map(|o| o.raw.trim())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);
        prompt.push_str(&context);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(description: &str) -> TaskSpec {
        TaskSpec {
            description: description.to_string(),
            expected_output: "A list".to_string(),
            agent: "analyst".to_string(),
        }
    }

    #[test]
    fn prompt_embeds_inputs_and_previous_outputs() {
        let inputs = PipelineInputs {
            file_paths: "d/0000-a.txt, d/0001-b.txt".to_string(),
            products: "https://a.example".to_string(),
        };
        let previous = vec![TaskOutput {
            agent: "analyst".to_string(),
            description: "first".to_string(),
            raw: "Notes on A".to_string(),
        }];
        let prompt = task_prompt(&task("Read {{file_paths}}"), &inputs.vars(), &previous);
        assert!(prompt.starts_with("Read d/0000-a.txt, d/0001-b.txt"));
        assert!(prompt.contains("expected criteria for your final answer: A list"));
        assert!(prompt.ends_with("Notes on A"));
    }

    #[test]
    fn first_prompt_has_no_context_block() {
        let inputs = PipelineInputs {
            file_paths: String::new(),
            products: String::new(),
        };
        let prompt = task_prompt(&task("Go"), &inputs.vars(), &[]);
        assert!(!prompt.contains("context you're working with"));
    }

    #[test]
    fn preamble_uses_title_when_present() {
        let spec = AgentSpec {
            title: Some("Market Researcher".to_string()),
            goal: "Find gaps".to_string(),
            backstory: "Knows the market.".to_string(),
            capabilities: vec![],
        };
        let text = preamble("researcher", &spec);
        assert!(text.starts_with("You are Market Researcher. Knows the market."));
        assert!(text.ends_with("Your personal goal is: Find gaps"));
    }
}
