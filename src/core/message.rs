use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::model::ModelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    EndTurn,
    MaxTokens,
    ToolUse,
    ContentFilter,
}

impl FinishReason {
    /// Map an OpenAI `finish_reason` string.
    pub fn from_openai(reason: &str) -> Self {
        match reason {
            "length" => Self::MaxTokens,
            "tool_calls" | "function_call" => Self::ToolUse,
            "content_filter" => Self::ContentFilter,
            _ => Self::EndTurn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        input: String,
    },
    ToolResult {
        tool_call_id: String,
        name: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Role-tagged content carried by an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub parts: Vec<ContentPart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<ModelId>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn with_role(role: MessageRole, parts: Vec<ContentPart>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            parts,
            model_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn new_user(text: String) -> Self {
        Self::with_role(MessageRole::User, vec![ContentPart::Text { text }])
    }

    pub fn new_assistant(model_id: ModelId) -> Self {
        let mut msg = Self::with_role(MessageRole::Assistant, Vec::new());
        msg.model_id = Some(model_id);
        msg
    }

    pub fn new_tool_result(results: Vec<ContentPart>) -> Self {
        Self::with_role(MessageRole::Tool, results)
    }

    pub fn tool_calls(&self) -> Vec<(&str, &str, &str)> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::ToolCall { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input.as_str()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn tool_results(&self) -> Vec<&ContentPart> {
        self.parts
            .iter()
            .filter(|p| matches!(p, ContentPart::ToolResult { .. }))
            .collect()
    }

    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn append_text(&mut self, delta: &str) {
        if let Some(ContentPart::Text { text }) = self.parts.last_mut() {
            text.push_str(delta);
        } else {
            self.parts.push(ContentPart::Text {
                text: delta.to_string(),
            });
        }
    }

    pub fn add_tool_call(&mut self, id: String, name: String, input: String) {
        self.parts.push(ContentPart::ToolCall { id, name, input });
    }
}
