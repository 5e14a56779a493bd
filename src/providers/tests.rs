use super::openai::*;
use super::*;
use crate::core::error::ProviderError;
use crate::core::message::*;
use crate::core::model::ModelId;
use crate::core::provider::ProviderEvent;
use crate::core::tool::ToolDefinition;

fn chunk(json: serde_json::Value) -> String {
    format!("data: {json}")
}

#[test]
fn test_create_provider_requires_key() {
    let config = AppConfig::default();
    let err = create_provider(&config, None).err().unwrap();
    assert_eq!(err.missing_credential(), Some("OPENAI_API_KEY"));
}

#[test]
fn test_create_provider_resolves_model() {
    let mut config = AppConfig::default();
    config.api_key = Some("sk-test".into());

    let provider = create_provider(&config, None).unwrap();
    assert_eq!(provider.model().api_name, "gpt-5-nano");

    let override_id = ModelId::from("openai/gpt-4o-mini");
    let provider = create_provider(&config, Some(&override_id)).unwrap();
    assert_eq!(provider.model().api_name, "gpt-4o-mini");

    let unsupported = ModelId::from("vertex/gemini");
    assert!(create_provider(&config, Some(&unsupported)).is_err());
}

#[test]
fn test_convert_messages_round_trip_shapes() {
    let user = Message::new_user("What's the status of ticket 5678?".into());
    let mut assistant = Message::new_assistant(ModelId::from("openai/gpt-5-nano"));
    assistant.add_tool_call(
        "call_1".into(),
        "lookup_ticket".into(),
        r#"{"ticket_id":"5678"}"#.into(),
    );
    let tool = Message::new_tool_result(vec![ContentPart::ToolResult {
        tool_call_id: "call_1".into(),
        name: "lookup_ticket".into(),
        content: r#"{"status":"In Progress"}"#.into(),
        is_error: false,
    }]);

    let wire = convert_messages(&[user, assistant, tool], "Be helpful.");
    assert_eq!(wire.len(), 4);
    assert_eq!(wire[0]["role"], "system");
    assert_eq!(wire[1]["content"], "What's the status of ticket 5678?");
    assert_eq!(wire[2]["role"], "assistant");
    assert!(wire[2].get("content").is_none());
    assert_eq!(wire[2]["tool_calls"][0]["function"]["name"], "lookup_ticket");
    assert_eq!(
        wire[2]["tool_calls"][0]["function"]["arguments"],
        r#"{"ticket_id":"5678"}"#
    );
    assert_eq!(wire[3]["role"], "tool");
    assert_eq!(wire[3]["tool_call_id"], "call_1");
}

#[test]
fn test_convert_tools_schema() {
    let def = ToolDefinition::single_string_arg(
        "lookup_ticket",
        "Look up details for a support ticket.",
        "ticket_id",
        "Ticket identifier",
    );
    let wire = convert_tools(&[def]);
    let func = &wire[0]["function"];
    assert_eq!(wire[0]["type"], "function");
    assert_eq!(func["name"], "lookup_ticket");
    assert_eq!(func["parameters"]["type"], "object");
    assert_eq!(func["parameters"]["properties"]["ticket_id"]["type"], "string");
    assert_eq!(func["parameters"]["required"][0], "ticket_id");
}

#[test]
fn test_parse_response_with_tool_call() {
    let resp = parse_openai_response(serde_json::json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": "lookup_ticket", "arguments": "{\"ticket_id\":\"5678\"}" }
                }]
            },
            "finish_reason": "tool_calls"
        }],
        "usage": { "prompt_tokens": 120, "completion_tokens": 18 }
    }))
    .unwrap();

    assert_eq!(resp.finish_reason, FinishReason::ToolUse);
    assert_eq!(resp.content.len(), 1);
    assert!(matches!(
        &resp.content[0],
        ContentPart::ToolCall { name, .. } if name == "lookup_ticket"
    ));
    assert_eq!(resp.usage.input_tokens, 120);
    assert_eq!(resp.usage.output_tokens, 18);
}

#[test]
fn test_parse_response_without_choices() {
    let err = parse_openai_response(serde_json::json!({ "object": "error" })).unwrap_err();
    assert!(matches!(err, ProviderError::Stream(_)));
}

#[test]
fn test_decoder_text_then_usage() {
    let mut decoder = StreamDecoder::default();

    let events = match decoder.decode_line(&chunk(serde_json::json!({
        "choices": [{ "index": 0, "delta": { "content": "Hello" }, "finish_reason": null }]
    }))) {
        SseLine::Events(e) => e,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(
        events,
        vec![ProviderEvent::ContentDelta {
            text: "Hello".into()
        }]
    );

    decoder.decode_line(&chunk(serde_json::json!({
        "choices": [{ "index": 0, "delta": {}, "finish_reason": "stop" }]
    })));
    decoder.decode_line(&chunk(serde_json::json!({
        "choices": [],
        "usage": { "prompt_tokens": 10, "completion_tokens": 2 }
    })));
    assert_eq!(decoder.decode_line("data: [DONE]"), SseLine::Done);

    let tail = decoder.finish();
    assert_eq!(
        tail,
        vec![ProviderEvent::Complete {
            finish_reason: FinishReason::EndTurn,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 2
            },
        }]
    );
    assert!(decoder.finish().is_empty());
}

#[test]
fn test_decoder_tool_call_fragments() {
    let mut decoder = StreamDecoder::default();
    let mut events = decoder.decode_chunk(&serde_json::json!({
        "choices": [{ "index": 0, "delta": { "tool_calls": [{
            "index": 0, "id": "call_1", "type": "function",
            "function": { "name": "lookup_ticket", "arguments": "" }
        }]}}]
    }));
    events.extend(decoder.decode_chunk(&serde_json::json!({
        "choices": [{ "index": 0, "delta": { "tool_calls": [{
            "index": 0, "function": { "name": "", "arguments": "{\"ticket_id\":" }
        }]}}]
    })));
    events.extend(decoder.decode_chunk(&serde_json::json!({
        "choices": [{ "index": 0, "delta": { "tool_calls": [{
            "index": 0, "function": { "arguments": "\"5678\"}" }
        }]}}]
    })));
    events.extend(decoder.decode_chunk(&serde_json::json!({
        "choices": [{ "index": 0, "delta": {}, "finish_reason": "tool_calls" }]
    })));
    events.extend(decoder.finish());

    assert_eq!(
        events,
        vec![
            ProviderEvent::ToolUseStart {
                id: "call_1".into(),
                name: "lookup_ticket".into()
            },
            ProviderEvent::ToolUseDelta {
                input_json_chunk: "{\"ticket_id\":".into()
            },
            ProviderEvent::ToolUseDelta {
                input_json_chunk: "\"5678\"}".into()
            },
            ProviderEvent::ToolUseStop,
            ProviderEvent::Complete {
                finish_reason: FinishReason::ToolUse,
                usage: TokenUsage::default(),
            },
        ]
    );
}

#[test]
fn test_decoder_skips_comments_and_reports_garbage() {
    let mut decoder = StreamDecoder::default();
    assert_eq!(decoder.decode_line(": keep-alive"), SseLine::Skip);
    assert_eq!(decoder.decode_line(""), SseLine::Skip);

    match decoder.decode_line("data: {broken") {
        SseLine::Events(events) => {
            assert!(matches!(
                events.as_slice(),
                [ProviderEvent::Error {
                    error: ProviderError::Stream(_)
                }]
            ));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_line_buffer_joins_split_multibyte_char() {
    let line = chunk(serde_json::json!({
        "choices": [{ "index": 0, "delta": { "content": "café" }, "finish_reason": null }]
    })) + "\n";
    let bytes = line.as_bytes();
    let split = line.find('é').unwrap() + 1;

    let mut lines = LineBuffer::default();
    lines.push(&bytes[..split]);
    assert!(lines.next_line().is_none());
    lines.push(&bytes[split..]);

    let decoded = lines.next_line().unwrap().unwrap();
    let mut decoder = StreamDecoder::default();
    assert_eq!(
        decoder.decode_line(&decoded),
        SseLine::Events(vec![ProviderEvent::ContentDelta {
            text: "café".into()
        }])
    );
    assert!(lines.next_line().is_none());
    assert!(lines.take_rest().is_none());
}

#[test]
fn test_line_buffer_keeps_unterminated_tail() {
    let mut lines = LineBuffer::default();
    lines.push(b"data: [DONE]\r\n: ping\ndata: {\"choices\":[]}");
    assert_eq!(lines.next_line().unwrap().unwrap(), "data: [DONE]");
    assert_eq!(lines.next_line().unwrap().unwrap(), ": ping");
    assert!(lines.next_line().is_none());
    assert_eq!(
        lines.take_rest().unwrap().unwrap(),
        r#"data: {"choices":[]}"#
    );
}

#[test]
fn test_line_buffer_rejects_invalid_utf8() {
    let mut lines = LineBuffer::default();
    lines.push(&[b'd', 0xC3, b'\n']);
    assert!(matches!(
        lines.next_line(),
        Some(Err(ProviderError::Stream(_)))
    ));
}

#[test]
fn test_decoder_without_finish_reason_is_an_error() {
    let mut decoder = StreamDecoder::default();
    assert_eq!(decoder.decode_line("{}"), SseLine::Skip);
    decoder.decode_line(&chunk(serde_json::json!({
        "choices": [{ "index": 0, "delta": { "content": "Hel" }, "finish_reason": null }]
    })));

    assert!(matches!(
        decoder.finish().as_slice(),
        [ProviderEvent::Error {
            error: ProviderError::Stream(_)
        }]
    ));
}
