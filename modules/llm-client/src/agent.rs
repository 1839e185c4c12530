use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::ChatClient;
use crate::error::{LlmError, Result};
use crate::tool::{DynTool, Tool, ToolSet};
use crate::wire::{ChatMessage, ChatRequest, Role};

/// A model bound to a client, sampling settings and a set of tools.
#[derive(Clone)]
pub struct ChatAgent {
    client: ChatClient,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    tools: ToolSet,
}

impl ChatAgent {
    pub fn new(client: ChatClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            tools: ToolSet::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools = self.tools.with(tool);
        self
    }

    pub fn dyn_tool(mut self, tool: Arc<dyn DynTool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Replace the agent's tools.
    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn prompt(&self, input: impl Into<String>) -> Prompt<'_> {
        Prompt {
            agent: self,
            input: input.into(),
            preamble: None,
            history: Vec::new(),
            max_turns: 1,
        }
    }
}

/// One prompt against a [`ChatAgent`]. Runs the tool-calling loop until the
/// model answers in text or `max_turns` round trips are used.
pub struct Prompt<'a> {
    agent: &'a ChatAgent,
    input: String,
    preamble: Option<String>,
    history: Vec<ChatMessage>,
    max_turns: usize,
}

impl Prompt<'_> {
    pub fn preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    pub fn history(mut self, messages: Vec<ChatMessage>) -> Self {
        self.history = messages;
        self
    }

    pub fn multi_turn(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub async fn send(self) -> Result<String> {
        let agent = self.agent;

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(preamble) = self.preamble {
            messages.push(ChatMessage::system(preamble));
        }
        messages.extend(self.history);
        if !self.input.is_empty() {
            messages.push(ChatMessage::user(self.input));
        }

        let mut request = ChatRequest::new(&agent.model, messages);
        request.temperature = agent.temperature;
        request.max_tokens = agent.max_tokens;
        if !agent.tools.is_empty() {
            request.tools = agent.tools.specs();
            request.tool_choice = Some("auto");
        }

        for turn in 1..=self.max_turns {
            let response = agent.client.chat(&request).await?;
            let message = response
                .choices
                .into_iter()
                .next()
                .ok_or(LlmError::EmptyResponse)?
                .message;

            if message.role != Role::Assistant {
                warn!(role = ?message.role, "Unexpected role in completion");
            }

            let calls = message.requested_calls().to_vec();
            if calls.is_empty() {
                return Ok(message.content.unwrap_or_default());
            }

            debug!(turn, calls = calls.len(), "Model requested tool calls");
            request.messages.push(message);

            for call in calls {
                let tool = agent
                    .tools
                    .get(&call.function.name)
                    .ok_or_else(|| LlmError::ToolNotFound(call.function.name.clone()))?;

                let content = run_tool_call(tool.as_ref(), &call.function.arguments).await?;
                request
                    .messages
                    .push(ChatMessage::tool_result(&call.id, content));
            }
        }

        Err(LlmError::MaxTurns(self.max_turns))
    }
}

/// Run one requested call and turn the outcome into tool-message text.
/// Bad arguments and tool failures go back to the model as `Error: ...`.
async fn run_tool_call(tool: &dyn DynTool, arguments: &str) -> Result<String> {
    // Some models send an empty string for tools without parameters.
    let args = if arguments.trim().is_empty() {
        serde_json::Value::Object(Default::default())
    } else {
        match serde_json::from_str(arguments) {
            Ok(args) => args,
            Err(e) => return Ok(format!("Error: invalid arguments: {e}")),
        }
    };

    Ok(match tool.call_json(args).await {
        Ok(serde_json::Value::String(s)) => s,
        Ok(other) => serde_json::to_string(&other)?,
        Err(e) => format!("Error: {e}"),
    })
}
