use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeSet;

use crate::core::error::ProviderError;
use crate::core::message::*;
use crate::core::model::Model;
use crate::core::provider::*;
use crate::core::tool::ToolDefinition;

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: Model,
    base_url: String,
    max_tokens: Option<u64>,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: Model, base_url: String, max_tokens: Option<u64>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_tokens,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn request_body(
        &self,
        messages: &[Message],
        system_prompt: &str,
        tools: &[ToolDefinition],
        stream: bool,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model.api_name,
            "messages": convert_messages(messages, system_prompt),
        });

        if let Some(max_tokens) = self.max_tokens {
            body["max_completion_tokens"] = serde_json::json!(max_tokens);
        }
        if !tools.is_empty() {
            body["tools"] = serde_json::json!(convert_tools(tools));
        }
        if stream {
            body["stream"] = serde_json::json!(true);
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
        body
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response, ProviderError> {
        tracing::debug!(model = %self.model.api_name, url = %self.endpoint(), "chat completion request");

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }
}

pub(crate) fn convert_messages(messages: &[Message], system_prompt: &str) -> Vec<serde_json::Value> {
    let mut result = Vec::new();
    if !system_prompt.is_empty() {
        result.push(serde_json::json!({
            "role": "system",
            "content": system_prompt,
        }));
    }

    for msg in messages {
        match msg.role {
            MessageRole::User => {
                let text = msg.text_content();
                if !text.is_empty() {
                    result.push(serde_json::json!({
                        "role": "user",
                        "content": text,
                    }));
                }
            }
            MessageRole::Assistant => {
                let text = msg.text_content();
                let tool_calls: Vec<serde_json::Value> = msg
                    .tool_calls()
                    .into_iter()
                    .map(|(id, name, input)| {
                        serde_json::json!({
                            "id": id,
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": input,
                            }
                        })
                    })
                    .collect();

                let mut assistant_msg = serde_json::json!({"role": "assistant"});
                if !text.is_empty() {
                    assistant_msg["content"] = serde_json::Value::String(text);
                }
                if !tool_calls.is_empty() {
                    assistant_msg["tool_calls"] = serde_json::json!(tool_calls);
                }
                result.push(assistant_msg);
            }
            MessageRole::Tool => {
                for part in &msg.parts {
                    if let ContentPart::ToolResult {
                        tool_call_id,
                        content,
                        ..
                    } = part
                    {
                        result.push(serde_json::json!({
                            "role": "tool",
                            "tool_call_id": tool_call_id,
                            "content": content,
                        }));
                    }
                }
            }
        }
    }

    result
}

pub(crate) fn convert_tools(tools: &[ToolDefinition]) -> Vec<serde_json::Value> {
    tools
        .iter()
        .map(|t| {
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": {
                        "type": "object",
                        "properties": t.parameters,
                        "required": t.required,
                    }
                }
            })
        })
        .collect()
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn send_messages(
        &self,
        messages: &[Message],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<ProviderResponse, ProviderError> {
        let body = self.request_body(messages, system_prompt, tools, false);
        let resp = self.post(&body).await?;
        let api_resp: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Stream(format!("malformed response body: {e}")))?;
        parse_openai_response(api_resp)
    }

    async fn stream_response(
        &self,
        messages: &[Message],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<ProviderEventStream, ProviderError> {
        let body = self.request_body(messages, system_prompt, tools, true);
        let resp = self.post(&body).await?;
        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            use tokio_stream::StreamExt;

            let mut byte_stream = Box::pin(byte_stream);
            let mut lines = LineBuffer::default();
            let mut decoder = StreamDecoder::default();

            'read: while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield ProviderEvent::Error {
                            error: ProviderError::Stream(e.to_string()),
                        };
                        return;
                    }
                };

                lines.push(&chunk);
                while let Some(line) = lines.next_line() {
                    let line = match line {
                        Ok(l) => l,
                        Err(error) => {
                            yield ProviderEvent::Error { error };
                            return;
                        }
                    };
                    match decoder.decode_line(&line) {
                        SseLine::Events(events) => {
                            for event in events {
                                yield event;
                            }
                        }
                        SseLine::Done => break 'read,
                        SseLine::Skip => {}
                    }
                }
            }

            // A last line may arrive without its newline
            match lines.take_rest() {
                Some(Ok(line)) => {
                    if let SseLine::Events(events) = decoder.decode_line(&line) {
                        for event in events {
                            yield event;
                        }
                    }
                }
                Some(Err(error)) => {
                    yield ProviderEvent::Error { error };
                    return;
                }
                None => {}
            }

            for event in decoder.finish() {
                yield event;
            }
        };

        Ok(Box::pin(stream))
    }

    fn model(&self) -> &Model {
        &self.model
    }
}

/// Splits a byte stream into text lines. Bytes are only decoded once a full
/// line is buffered, so multi-byte characters may straddle chunk boundaries.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    pub(crate) fn next_line(&mut self) -> Option<Result<String, ProviderError>> {
        let line_end = self.buf.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buf.drain(..=line_end).collect();
        Some(decode_utf8(&line[..line_end]))
    }

    /// Whatever is left after the stream ends, if it is not blank.
    pub(crate) fn take_rest(&mut self) -> Option<Result<String, ProviderError>> {
        let rest = std::mem::take(&mut self.buf);
        match decode_utf8(&rest) {
            Ok(line) if line.is_empty() => None,
            other => Some(other),
        }
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<String, ProviderError> {
    std::str::from_utf8(bytes)
        .map(|s| s.trim().to_string())
        .map_err(|e| ProviderError::Stream(format!("invalid UTF-8 in stream: {e}")))
}

/// Outcome of decoding one SSE line.
#[derive(Debug, PartialEq)]
pub(crate) enum SseLine {
    Events(Vec<ProviderEvent>),
    Done,
    Skip,
}

/// Turns `chat.completion.chunk` payloads into provider events.
///
/// The finish reason and the usage block arrive in separate chunks when
/// `include_usage` is set, so `Complete` is held back until `finish`.
#[derive(Debug, Default)]
pub(crate) struct StreamDecoder {
    open_tool_calls: BTreeSet<i64>,
    finish_reason: Option<FinishReason>,
    usage: TokenUsage,
    completed: bool,
}

impl StreamDecoder {
    pub(crate) fn decode_line(&mut self, line: &str) -> SseLine {
        let data = match line.strip_prefix("data:") {
            Some(d) => d.trim(),
            None => return SseLine::Skip,
        };
        if data == "[DONE]" {
            return SseLine::Done;
        }
        match serde_json::from_str::<serde_json::Value>(data) {
            Ok(json) => SseLine::Events(self.decode_chunk(&json)),
            Err(e) => SseLine::Events(vec![ProviderEvent::Error {
                error: ProviderError::Stream(format!("malformed chunk: {e}")),
            }]),
        }
    }

    pub(crate) fn decode_chunk(&mut self, json: &serde_json::Value) -> Vec<ProviderEvent> {
        let mut events = Vec::new();

        if let Some(err) = json.get("error") {
            events.push(ProviderEvent::Error {
                error: ProviderError::Stream(
                    err["message"].as_str().unwrap_or("unknown error").to_string(),
                ),
            });
            return events;
        }

        if let Some(u) = json.get("usage").filter(|u| !u.is_null()) {
            self.usage = parse_usage(u);
        }

        let Some(choices) = json["choices"].as_array() else {
            return events;
        };

        for choice in choices {
            let delta = &choice["delta"];

            if let Some(text) = delta["content"].as_str() {
                if !text.is_empty() {
                    events.push(ProviderEvent::ContentDelta {
                        text: text.to_string(),
                    });
                }
            }

            if let Some(tool_calls) = delta["tool_calls"].as_array() {
                for tc in tool_calls {
                    let index = tc["index"].as_i64().unwrap_or(0);
                    let func = &tc["function"];

                    // Later chunks for the same call repeat the index with an empty name
                    let name = func["name"].as_str().unwrap_or("");
                    if !name.is_empty() && self.open_tool_calls.insert(index) {
                        events.push(ProviderEvent::ToolUseStart {
                            id: tc["id"].as_str().unwrap_or("").to_string(),
                            name: name.to_string(),
                        });
                    }
                    if let Some(args) = func["arguments"].as_str() {
                        if !args.is_empty() {
                            events.push(ProviderEvent::ToolUseDelta {
                                input_json_chunk: args.to_string(),
                            });
                        }
                    }
                }
            }

            if let Some(reason) = choice["finish_reason"].as_str() {
                for _ in std::mem::take(&mut self.open_tool_calls) {
                    events.push(ProviderEvent::ToolUseStop);
                }
                self.finish_reason = Some(FinishReason::from_openai(reason));
            }
        }

        events
    }

    /// Flush at end of stream. A stream that never reported a finish reason
    /// was truncated or was not a completion stream at all.
    pub(crate) fn finish(&mut self) -> Vec<ProviderEvent> {
        if self.completed {
            return Vec::new();
        }
        self.completed = true;

        let Some(finish_reason) = self.finish_reason else {
            return vec![ProviderEvent::Error {
                error: ProviderError::Stream("stream ended without a finish reason".into()),
            }];
        };

        let mut events: Vec<ProviderEvent> = std::mem::take(&mut self.open_tool_calls)
            .into_iter()
            .map(|_| ProviderEvent::ToolUseStop)
            .collect();
        events.push(ProviderEvent::Complete {
            finish_reason,
            usage: std::mem::take(&mut self.usage),
        });
        events
    }
}

fn parse_usage(u: &serde_json::Value) -> TokenUsage {
    TokenUsage {
        input_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
        output_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
    }
}

pub(crate) fn parse_openai_response(json: serde_json::Value) -> Result<ProviderResponse, ProviderError> {
    let choice = json["choices"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| ProviderError::Stream("No choices in response".into()))?;

    let message = &choice["message"];
    let mut content = Vec::new();

    if let Some(text) = message["content"].as_str() {
        if !text.is_empty() {
            content.push(ContentPart::Text {
                text: text.to_string(),
            });
        }
    }

    if let Some(tool_calls) = message["tool_calls"].as_array() {
        for tc in tool_calls {
            content.push(ContentPart::ToolCall {
                id: tc["id"].as_str().unwrap_or("").to_string(),
                name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
                input: tc["function"]["arguments"]
                    .as_str()
                    .unwrap_or("{}")
                    .to_string(),
            });
        }
    }

    let finish_reason = choice["finish_reason"]
        .as_str()
        .map(FinishReason::from_openai)
        .unwrap_or(FinishReason::EndTurn);

    Ok(ProviderResponse {
        content,
        finish_reason,
        usage: parse_usage(&json["usage"]),
    })
}
