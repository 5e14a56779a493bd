use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::error::ToolError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSchema {
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
}

impl ParamSchema {
    pub fn string(description: &str) -> Self {
        Self {
            param_type: "string".into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: BTreeMap<String, ParamSchema>,
    pub required: Vec<String>,
}

impl ToolDefinition {
    /// A tool taking exactly one required string argument.
    pub fn single_string_arg(name: &str, description: &str, arg: &str, arg_description: &str) -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert(arg.to_string(), ParamSchema::string(arg_description));
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            required: vec![arg.to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: String,
}

impl ToolCall {
    /// Pull a required string argument out of the JSON input.
    pub fn string_arg(&self, key: &str) -> Result<String, ToolError> {
        let params: serde_json::Value = serde_json::from_str(&self.input)
            .map_err(|e| ToolError::InvalidParams(format!("arguments are not JSON: {e}")))?;
        params[key]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ToolError::InvalidParams(format!("missing string argument '{key}'")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: String) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            content: message,
            is_error: true,
        }
    }

    pub fn json(value: &serde_json::Value) -> Self {
        Self::success(value.to_string())
    }
}

pub struct ToolContext {
    pub session_id: String,
    pub invocation_id: String,
    pub agent_name: String,
}

impl ToolContext {
    /// Span that ties a tool run to its session and invocation in the logs.
    pub fn span(&self, tool_name: &str) -> tracing::Span {
        tracing::debug_span!(
            "tool",
            tool = tool_name,
            agent = %self.agent_name,
            session_id = %self.session_id,
            invocation_id = %self.invocation_id,
        )
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn run(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError>;
}
