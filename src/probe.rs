//! One-shot probe: build the IT-support agent, send a single message and
//! print everything the runner emits.

use std::io::Write;
use std::sync::Arc;
use tokio_stream::StreamExt;

use crate::agent::{LlmAgent, Runner};
use crate::core::config::AppConfig;
use crate::core::error::ProbeError;
use crate::core::event::Event;
use crate::core::message::Message;
use crate::core::session::{SessionService, SessionState};
use crate::providers;
use crate::tools;

pub const DEFAULT_MESSAGE: &str = "What's the status of ticket 5678?";

const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Counts gathered while observing one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReport {
    pub event_count: usize,
    pub tool_call_count: usize,
    pub final_text: Option<String>,
}

impl ProbeReport {
    fn observe(&mut self, event: &Event) {
        self.event_count += 1;
        self.tool_call_count += event.function_calls().len();
        if event.is_final_response() {
            let text = event.text();
            if !text.is_empty() {
                self.final_text = Some(text);
            }
        }
    }
}

/// Run the probe end to end, writing diagnostics to `out`.
///
/// The credential is checked before anything else; without it no session is
/// created and no request is made.
pub async fn run_probe<W: Write>(
    config: &AppConfig,
    session_service: Arc<dyn SessionService>,
    message: &str,
    format: OutputFormat,
    out: &mut W,
) -> Result<ProbeReport, ProbeError> {
    config.require_api_key()?;

    let provider = providers::create_provider(config, None)?;
    let agent = LlmAgent::from_config(&config.agent, provider, tools::create_all_tools());
    if format == OutputFormat::Text {
        writeln!(out, "Agent created with {} tools", agent.tools().len())?;
        writeln!(out, "  name: {}, model: {}", agent.name(), agent.model_name())?;
    }

    let session = &config.session;
    session_service
        .create_session(
            &session.app_name,
            &session.user_id,
            Some(&session.session_id),
            SessionState::new(),
        )
        .await?;

    let runner = Runner::new(session.app_name.clone(), Arc::new(agent), session_service)
        .with_streaming(config.streaming);

    if format == OutputFormat::Text {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(out, "\n{rule}\nTesting: {message}\n{rule}")?;
        writeln!(out, "\nEvents:")?;
    }

    let mut events = runner
        .run(
            &session.user_id,
            &session.session_id,
            Message::new_user(message.to_string()),
        )
        .await?;

    let mut report = ProbeReport::default();
    while let Some(event) = events.next().await {
        let event = event?;
        report.observe(&event);
        match format {
            OutputFormat::Text => write_event_text(out, report.event_count, &event)?,
            OutputFormat::Json => write_event_json(out, report.event_count, &event)?,
        }
    }

    match format {
        OutputFormat::Text => writeln!(
            out,
            "\nSummary: {} events, {} tools called",
            report.event_count, report.tool_call_count
        )?,
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "summary": {
                    "events": report.event_count,
                    "tool_calls": report.tool_call_count,
                    "final_text": report.final_text,
                }
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
        }
    }

    Ok(report)
}

fn type_name_of<T>(_: &T) -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

fn write_event_text<W: Write>(out: &mut W, index: usize, event: &Event) -> Result<(), ProbeError> {
    writeln!(out, "\nEvent {index}: {}", type_name_of(event))?;
    writeln!(out, "  Attributes: {:?}", Event::attribute_names())?;
    writeln!(out, "  id: {}", event.id)?;
    writeln!(out, "  invocation_id: {}", event.invocation_id)?;
    writeln!(out, "  author: {}", event.author)?;
    writeln!(out, "  partial: {}", event.partial)?;
    writeln!(out, "  turn_complete: {}", event.turn_complete)?;

    let calls = event.function_calls();
    writeln!(out, "  function_calls: {}", calls.len())?;
    for call in &calls {
        writeln!(out, "    Tool: {}({}) [id={}]", call.name, call.args, call.id)?;
    }

    let responses = event.function_responses();
    if !responses.is_empty() {
        writeln!(out, "  function_responses: {}", responses.len())?;
        for resp in &responses {
            let marker = if resp.is_error { " (error)" } else { "" };
            writeln!(out, "    Response: {}{marker} -> {}", resp.name, resp.response)?;
        }
    }

    match &event.content {
        Some(content) => writeln!(out, "  content: {}", serde_json::to_string(content)?)?,
        None => writeln!(out, "  content: None")?,
    }
    if let Some(reason) = event.finish_reason {
        writeln!(out, "  finish_reason: {reason:?}")?;
    }
    if let Some(usage) = &event.usage {
        writeln!(
            out,
            "  usage: input {} / output {}",
            usage.input_tokens, usage.output_tokens
        )?;
    }
    if let Some(err) = &event.error_message {
        writeln!(out, "  error_message: {err}")?;
    }
    writeln!(out, "  timestamp: {}", event.timestamp.to_rfc3339())?;
    writeln!(out, "  is_final: {}", event.is_final_response())?;
    Ok(())
}

fn write_event_json<W: Write>(out: &mut W, index: usize, event: &Event) -> Result<(), ProbeError> {
    let value = serde_json::json!({
        "index": index,
        "type": type_name_of(event),
        "event": event,
        "function_call_count": event.function_calls().len(),
        "is_final_response": event.is_final_response(),
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
    Ok(())
}
