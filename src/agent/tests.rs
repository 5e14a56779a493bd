use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_stream::StreamExt;

use super::*;
use crate::core::error::{ProbeError, ProviderError, SessionError, ToolError};
use crate::core::event::Event;
use crate::core::message::*;
use crate::core::model::{resolve_model, Model, ModelId};
use crate::core::provider::*;
use crate::core::session::{SessionService, SessionState};
use crate::core::tool::ToolDefinition;
use crate::storage::InMemorySessionService;
use crate::tools::create_all_tools;

/// Replays canned responses and records what it was sent.
struct ScriptedProvider {
    model: Model,
    responses: Mutex<VecDeque<ProviderResponse>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Arc<Self> {
        Arc::new(Self {
            model: resolve_model(&ModelId::from("openai/gpt-5-nano")).unwrap(),
            responses: Mutex::new(responses.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn next(&self, messages: &[Message]) -> Result<ProviderResponse, ProviderError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::Http("script exhausted".into()))
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn send_messages(
        &self,
        messages: &[Message],
        _system_prompt: &str,
        _tools: &[ToolDefinition],
    ) -> Result<ProviderResponse, ProviderError> {
        self.next(messages)
    }

    async fn stream_response(
        &self,
        messages: &[Message],
        _system_prompt: &str,
        _tools: &[ToolDefinition],
    ) -> Result<ProviderEventStream, ProviderError> {
        let resp = self.next(messages)?;
        let mut events = Vec::new();
        for part in resp.content {
            match part {
                ContentPart::Text { text } => {
                    for word in text.split_inclusive(' ') {
                        events.push(ProviderEvent::ContentDelta { text: word.into() });
                    }
                }
                ContentPart::ToolCall { id, name, input } => {
                    events.push(ProviderEvent::ToolUseStart { id, name });
                    events.push(ProviderEvent::ToolUseDelta {
                        input_json_chunk: input,
                    });
                    events.push(ProviderEvent::ToolUseStop);
                }
                ContentPart::ToolResult { .. } => {}
            }
        }
        events.push(ProviderEvent::Complete {
            finish_reason: resp.finish_reason,
            usage: resp.usage,
        });
        Ok(Box::pin(tokio_stream::iter(events)))
    }

    fn model(&self) -> &Model {
        &self.model
    }
}

fn tool_call_response(name: &str, args: &str) -> ProviderResponse {
    ProviderResponse {
        content: vec![ContentPart::ToolCall {
            id: "call_1".into(),
            name: name.into(),
            input: args.into(),
        }],
        finish_reason: FinishReason::ToolUse,
        usage: TokenUsage {
            input_tokens: 100,
            output_tokens: 12,
        },
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        content: vec![ContentPart::Text { text: text.into() }],
        finish_reason: FinishReason::EndTurn,
        usage: TokenUsage {
            input_tokens: 140,
            output_tokens: 20,
        },
    }
}

async fn setup(provider: Arc<ScriptedProvider>) -> (Runner, Arc<InMemorySessionService>) {
    let service = Arc::new(InMemorySessionService::new());
    service
        .create_session("it_support_test", "debug_user", Some("debug_session"), SessionState::new())
        .await
        .unwrap();
    let agent = LlmAgent::new(
        "it_support_agent".into(),
        "An IT support agent".into(),
        "You are an IT support agent. Use the tools to help users.".into(),
        provider,
        create_all_tools(),
    );
    let runner = Runner::new("it_support_test", Arc::new(agent), service.clone());
    (runner, service)
}

async fn collect(runner: &Runner, text: &str) -> Vec<Result<Event, ProbeError>> {
    let stream = runner
        .run("debug_user", "debug_session", Message::new_user(text.into()))
        .await
        .unwrap();
    stream.collect().await
}

#[tokio::test]
async fn test_tool_call_then_answer() {
    let provider = ScriptedProvider::new(vec![
        tool_call_response("lookup_ticket", r#"{"ticket_id":"5678"}"#),
        text_response("Ticket 5678 is In Progress with High priority."),
    ]);
    let (runner, service) = setup(provider.clone()).await;

    let events: Vec<Event> = collect(&runner, "What's the status of ticket 5678?")
        .await
        .into_iter()
        .map(|e| e.unwrap())
        .collect();

    assert_eq!(events.len(), 3);
    assert_eq!(events[0].function_calls().len(), 1);
    assert!(!events[0].is_final_response());
    assert_eq!(events[0].finish_reason, Some(FinishReason::ToolUse));

    let responses = events[1].function_responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].name, "lookup_ticket");
    assert!(responses[0].response.contains("Alice Johnson"));
    assert!(!responses[0].is_error);

    assert!(events[2].is_final_response());
    assert!(events[2].turn_complete);
    assert!(events[2].text().contains("In Progress"));
    assert!(events.iter().all(|e| e.author == "it_support_agent"));
    assert!(events.iter().all(|e| e.invocation_id == events[0].invocation_id));

    // Second call sees user message, tool call and tool result
    {
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].len(), 3);
        assert_eq!(seen[1][2].role, MessageRole::Tool);
    }

    let session = service
        .get_session("it_support_test", "debug_user", "debug_session")
        .await
        .unwrap();
    assert_eq!(session.events.len(), 4);
    assert_eq!(session.events[0].author, "user");
}

#[tokio::test]
async fn test_direct_answer_without_tools() {
    let provider = ScriptedProvider::new(vec![text_response("I can help with that.")]);
    let (runner, _service) = setup(provider).await;

    let events = collect(&runner, "Hello").await;
    assert_eq!(events.len(), 1);
    let event = events[0].as_ref().unwrap();
    assert!(event.is_final_response());
    assert!(event.function_calls().is_empty());
}

#[tokio::test]
async fn test_bad_arguments_become_error_result() {
    let provider = ScriptedProvider::new(vec![
        tool_call_response("check_system_status", r#"{"service":"email"}"#),
        text_response("Could not check."),
    ]);
    let (runner, _service) = setup(provider).await;

    let events = collect(&runner, "Is email up?").await;
    assert_eq!(events.len(), 3);
    let responses = events[1].as_ref().unwrap().function_responses();
    assert!(responses[0].is_error);
    assert!(responses[0].response.contains("service_name"));
}

#[tokio::test]
async fn test_unknown_tool_is_fatal() {
    let provider = ScriptedProvider::new(vec![tool_call_response("reboot_server", "{}")]);
    let (runner, _service) = setup(provider).await;

    let events = collect(&runner, "Reboot it").await;
    assert_eq!(events.len(), 2);
    assert!(events[0].is_ok());
    assert!(matches!(
        events[1],
        Err(ProbeError::Tool(ToolError::NotFound(ref name))) if name == "reboot_server"
    ));
}

#[tokio::test]
async fn test_provider_failure_ends_stream() {
    let provider = ScriptedProvider::new(vec![]);
    let (runner, _service) = setup(provider).await;

    let events = collect(&runner, "Hello").await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Err(ProbeError::Provider(_))));
}

#[tokio::test]
async fn test_llm_call_limit() {
    let provider = ScriptedProvider::new(vec![
        tool_call_response("search_knowledge_base", r#"{"query":"vpn"}"#),
        tool_call_response("search_knowledge_base", r#"{"query":"vpn"}"#),
    ]);
    let service = Arc::new(InMemorySessionService::new());
    service
        .create_session("app", "user", Some("s1"), SessionState::new())
        .await
        .unwrap();
    let agent = LlmAgent::new(
        "looper".into(),
        String::new(),
        String::new(),
        provider,
        create_all_tools(),
    )
    .with_max_llm_calls(1);
    let runner = Runner::new("app", Arc::new(agent), service);

    let events: Vec<_> = runner
        .run("user", "s1", Message::new_user("vpn?".into()))
        .await
        .unwrap()
        .collect()
        .await;

    assert!(matches!(
        events.last(),
        Some(Err(ProbeError::LlmCallLimit { limit: 1, .. }))
    ));
}

#[tokio::test]
async fn test_missing_session_fails_before_model_call() {
    let provider = ScriptedProvider::new(vec![text_response("unused")]);
    let (runner, _service) = setup(provider.clone()).await;

    let err = runner
        .run("debug_user", "other_session", Message::new_user("hi".into()))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ProbeError::Session(SessionError::NotFound { .. })));
    assert!(provider.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_streaming_emits_partials_before_final() {
    let provider = ScriptedProvider::new(vec![
        tool_call_response("lookup_ticket", r#"{"ticket_id":"5678"}"#),
        text_response("Ticket 5678 is In Progress."),
    ]);
    let (runner, service) = setup(provider).await;
    let runner = runner.with_streaming(true);

    let events: Vec<Event> = collect(&runner, "Status of 5678?")
        .await
        .into_iter()
        .map(|e| e.unwrap())
        .collect();

    let partials: Vec<&Event> = events.iter().filter(|e| e.partial).collect();
    assert_eq!(partials.len(), 5);
    assert!(partials.iter().all(|e| !e.is_final_response()));

    let complete: Vec<&Event> = events.iter().filter(|e| !e.partial).collect();
    assert_eq!(complete.len(), 3);
    assert_eq!(complete[0].function_calls()[0].args, r#"{"ticket_id":"5678"}"#);
    assert_eq!(complete[2].text(), "Ticket 5678 is In Progress.");
    assert!(events.last().unwrap().is_final_response());

    // Partials are not stored
    let session = service
        .get_session("it_support_test", "debug_user", "debug_session")
        .await
        .unwrap();
    assert_eq!(session.events.len(), 4);
}
