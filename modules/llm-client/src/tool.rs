use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::wire::{FunctionSpec, ToolSpec};

/// Name, description and JSON-schema parameters advertised to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub(crate) fn into_spec(self) -> ToolSpec {
        ToolSpec {
            tool_type: "function",
            function: FunctionSpec {
                name: self.name,
                description: self.description,
                parameters: self.parameters,
            },
        }
    }
}

/// A typed capability the model may invoke during a prompt.
#[async_trait]
pub trait Tool: Send + Sync {
    const NAME: &'static str;
    type Error: std::error::Error + Send + Sync + 'static;
    type Args: DeserializeOwned + Send;
    type Output: Serialize + Send;

    fn definition(&self) -> ToolDefinition;
    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error>;
}

/// Object-safe view of a [`Tool`], taking and returning JSON.
#[async_trait]
pub trait DynTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn definition(&self) -> ToolDefinition;
    async fn call_json(&self, args: Value) -> Result<Value, String>;
}

pub struct ToolWrapper<T: Tool>(pub T);

#[async_trait]
impl<T: Tool> DynTool for ToolWrapper<T> {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn definition(&self) -> ToolDefinition {
        self.0.definition()
    }

    async fn call_json(&self, args: Value) -> Result<Value, String> {
        let args: T::Args =
            serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))?;
        let output = self.0.call(args).await.map_err(|e| e.to_string())?;
        serde_json::to_value(output).map_err(|e| format!("unserializable output: {e}"))
    }
}

/// The tools attached to one agent.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn DynTool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(ToolWrapper(tool)));
        self
    }

    pub fn push(&mut self, tool: Arc<dyn DynTool>) {
        self.tools.push(tool);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn DynTool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub(crate) fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|t| t.definition().into_spec())
            .collect()
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(|t| t.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct UpperArgs {
        text: String,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("empty input")]
    struct EmptyInput;

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        const NAME: &'static str = "upper";
        type Error = EmptyInput;
        type Args = UpperArgs;
        type Output = String;

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: Self::NAME.to_string(),
                description: "Uppercase the input".to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"]
                }),
            }
        }

        async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
            if args.text.is_empty() {
                return Err(EmptyInput);
            }
            Ok(args.text.to_uppercase())
        }
    }

    #[tokio::test]
    async fn wrapper_round_trips_json() {
        let tools = ToolSet::new().with(Upper);
        let tool = tools.get("upper").unwrap();
        let out = tool.call_json(serde_json::json!({"text": "abc"})).await.unwrap();
        assert_eq!(out, serde_json::json!("ABC"));
    }

    #[tokio::test]
    async fn wrapper_reports_tool_and_argument_errors() {
        let tools = ToolSet::new().with(Upper);
        let tool = tools.get("upper").unwrap();
        let err = tool.call_json(serde_json::json!({"text": ""})).await.unwrap_err();
        assert_eq!(err, "empty input");
        let err = tool.call_json(serde_json::json!({"wrong": 1})).await.unwrap_err();
        assert!(err.starts_with("invalid arguments"));
    }

    #[test]
    fn specs_advertise_function_tools() {
        let specs = ToolSet::new().with(Upper).specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].function.name, "upper");
        assert_eq!(specs[0].tool_type, "function");
    }
}
