use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::message::{ContentPart, FinishReason, Message, TokenUsage};

/// Author recorded on events that carry the user's own message.
pub const USER_AUTHOR: &str = "user";

/// One step of model/tool interaction emitted by the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub invocation_id: String,
    pub author: String,
    pub content: Option<Message>,
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub turn_complete: bool,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<TokenUsage>,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A tool invocation requested by the model, as seen on an event.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub args: &'a str,
}

/// A tool result recorded on an event.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResponse<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub response: &'a str,
    pub is_error: bool,
}

impl Event {
    pub fn new(invocation_id: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            invocation_id: invocation_id.into(),
            author: author.into(),
            content: None,
            partial: false,
            turn_complete: false,
            finish_reason: None,
            usage: None,
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_content(mut self, content: Message) -> Self {
        self.content = Some(content);
        self
    }

    pub fn function_calls(&self) -> Vec<FunctionCall<'_>> {
        let Some(content) = &self.content else {
            return Vec::new();
        };
        content
            .tool_calls()
            .into_iter()
            .map(|(id, name, args)| FunctionCall { id, name, args })
            .collect()
    }

    pub fn function_responses(&self) -> Vec<FunctionResponse<'_>> {
        let Some(content) = &self.content else {
            return Vec::new();
        };
        content
            .parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::ToolResult {
                    tool_call_id,
                    name,
                    content,
                    is_error,
                } => Some(FunctionResponse {
                    id: tool_call_id,
                    name,
                    response: content,
                    is_error: *is_error,
                }),
                _ => None,
            })
            .collect()
    }

    /// True when this event is a finished answer for the user: no pending
    /// tool calls, no tool results, and not a streaming fragment.
    pub fn is_final_response(&self) -> bool {
        !self.partial && self.function_calls().is_empty() && self.function_responses().is_empty()
    }

    pub fn text(&self) -> String {
        self.content
            .as_ref()
            .map(Message::text_content)
            .unwrap_or_default()
    }

    /// Every attribute an event exposes, fields first, then derived views.
    pub fn attribute_names() -> &'static [&'static str] {
        &[
            "id",
            "invocation_id",
            "author",
            "content",
            "partial",
            "turn_complete",
            "finish_reason",
            "usage",
            "error_message",
            "timestamp",
            "function_calls",
            "function_responses",
            "is_final_response",
            "text",
        ]
    }
}
