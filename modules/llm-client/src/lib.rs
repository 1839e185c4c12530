pub mod agent;
pub mod client;
pub mod error;
pub mod tool;
pub mod wire;

pub use agent::{ChatAgent, Prompt};
pub use client::{ChatClient, DEEPSEEK_API_URL, OPENAI_API_URL};
pub use error::{LlmError, Result};
pub use tool::{DynTool, Tool, ToolDefinition, ToolSet, ToolWrapper};
pub use wire::{ChatMessage, Role};
