use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::Instrument;

use crate::core::config::AgentConfig;
use crate::core::error::{ProbeError, ToolError};
use crate::core::event::Event;
use crate::core::message::*;
use crate::core::provider::*;
use crate::core::session::{Session, SessionService};
use crate::core::tool::*;

/// An agent bound to one model, one instruction and a fixed tool set.
pub struct LlmAgent {
    name: String,
    description: String,
    instruction: String,
    provider: Arc<dyn Provider>,
    tools: Vec<Arc<dyn Tool>>,
    max_llm_calls: u32,
}

impl LlmAgent {
    pub fn new(
        name: String,
        description: String,
        instruction: String,
        provider: Arc<dyn Provider>,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Self {
        Self {
            name,
            description,
            instruction,
            provider,
            tools,
            max_llm_calls: AgentConfig::default().max_llm_calls,
        }
    }

    pub fn from_config(
        config: &AgentConfig,
        provider: Arc<dyn Provider>,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Self {
        Self::new(
            config.name.clone(),
            config.description.clone(),
            config.instruction.clone(),
            provider,
            tools,
        )
        .with_max_llm_calls(config.max_llm_calls)
    }

    pub fn with_max_llm_calls(mut self, max_llm_calls: u32) -> Self {
        self.max_llm_calls = max_llm_calls;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn model_name(&self) -> &str {
        &self.provider.model().display_name
    }
}

pub type EventSender = mpsc::Sender<Result<Event, ProbeError>>;

/// Everything one invocation needs besides the agent itself.
pub struct InvocationContext {
    pub invocation_id: String,
    pub session: Session,
    pub session_service: Arc<dyn SessionService>,
    pub streaming: bool,
}

impl InvocationContext {
    fn event(&self, author: &str) -> Event {
        Event::new(self.invocation_id.clone(), author)
    }

    /// Store a complete event on the session, then hand it to the consumer.
    async fn emit(&self, tx: &EventSender, event: Event) -> Result<(), ProbeError> {
        self.session_service
            .append_event(&self.session, &event)
            .await?;
        let _ = tx.send(Ok(event)).await;
        Ok(())
    }
}

pub(crate) async fn run_invocation(
    agent: Arc<LlmAgent>,
    ctx: InvocationContext,
    tx: EventSender,
) -> Result<(), ProbeError> {
    let tool_defs: Vec<ToolDefinition> = agent.tools.iter().map(|t| t.definition()).collect();
    let mut history: Vec<Message> = ctx
        .session
        .events
        .iter()
        .filter_map(|e| e.content.clone())
        .collect();

    for llm_call in 1..=agent.max_llm_calls {
        tracing::debug!(
            agent = %agent.name,
            invocation_id = %ctx.invocation_id,
            llm_call,
            streaming = ctx.streaming,
            "calling model"
        );

        let (content, finish_reason, usage) = if ctx.streaming {
            let mut stream = agent
                .provider
                .stream_response(&history, &agent.instruction, &tool_defs)
                .await?;
            process_stream(&mut stream, &agent, &ctx, &tx).await?
        } else {
            let resp = agent
                .provider
                .send_messages(&history, &agent.instruction, &tool_defs)
                .await?;
            let mut msg = Message::new_assistant(agent.provider.model().id.clone());
            msg.parts = resp.content;
            (msg, resp.finish_reason, resp.usage)
        };

        let calls: Vec<ToolCall> = content
            .tool_calls()
            .into_iter()
            .map(|(id, name, input)| ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                input: input.to_string(),
            })
            .collect();

        let mut event = ctx.event(&agent.name).with_content(content.clone());
        event.finish_reason = Some(finish_reason);
        event.usage = Some(usage);
        event.turn_complete = calls.is_empty();
        if finish_reason == FinishReason::ContentFilter {
            event.error_message = Some("response blocked by content filter".into());
        }
        ctx.emit(&tx, event).await?;
        history.push(content);

        if calls.is_empty() {
            return Ok(());
        }

        let results = execute_tool_calls(&agent, &ctx, &calls).await?;
        let tool_msg = Message::new_tool_result(results);
        ctx.emit(&tx, ctx.event(&agent.name).with_content(tool_msg.clone()))
            .await?;
        history.push(tool_msg);
    }

    Err(ProbeError::LlmCallLimit {
        agent: agent.name.clone(),
        limit: agent.max_llm_calls,
    })
}

async fn execute_tool_calls(
    agent: &LlmAgent,
    ctx: &InvocationContext,
    calls: &[ToolCall],
) -> Result<Vec<ContentPart>, ProbeError> {
    let tool_ctx = ToolContext {
        session_id: ctx.session.id.clone(),
        invocation_id: ctx.invocation_id.clone(),
        agent_name: agent.name.clone(),
    };

    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        let tool = agent
            .tools
            .iter()
            .find(|t| t.definition().name == call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        tracing::debug!(tool = %call.name, call_id = %call.id, input = %call.input, "running tool");

        let result = match tool
            .run(call, &tool_ctx)
            .instrument(tool_ctx.span(&call.name))
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(tool = %call.name, error = %e, "tool failed");
                ToolResult::error(e.to_string())
            }
        };

        results.push(ContentPart::ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content: result.content,
            is_error: result.is_error,
        });
    }
    Ok(results)
}

/// Drain one streamed model turn. Text deltas go out as partial events; the
/// aggregated message is returned for the final event of the turn.
async fn process_stream(
    stream: &mut ProviderEventStream,
    agent: &LlmAgent,
    ctx: &InvocationContext,
    tx: &EventSender,
) -> Result<(Message, FinishReason, TokenUsage), ProbeError> {
    let mut msg = Message::new_assistant(agent.provider.model().id.clone());

    let mut current_tool_id = String::new();
    let mut current_tool_name = String::new();
    let mut current_tool_input = String::new();
    let mut finish_reason = FinishReason::EndTurn;
    let mut usage = TokenUsage::default();

    while let Some(event) = stream.next().await {
        match event {
            ProviderEvent::ContentDelta { text } => {
                msg.append_text(&text);

                let mut delta = Message::new_assistant(agent.provider.model().id.clone());
                delta.append_text(&text);
                let mut partial = ctx.event(&agent.name).with_content(delta);
                partial.partial = true;
                let _ = tx.send(Ok(partial)).await;
            }
            ProviderEvent::ToolUseStart { id, name } => {
                // A new call closes the previous one
                if !current_tool_name.is_empty() {
                    msg.add_tool_call(
                        std::mem::take(&mut current_tool_id),
                        std::mem::take(&mut current_tool_name),
                        std::mem::take(&mut current_tool_input),
                    );
                }
                current_tool_id = id;
                current_tool_name = name;
                current_tool_input.clear();
            }
            ProviderEvent::ToolUseDelta { input_json_chunk } => {
                current_tool_input.push_str(&input_json_chunk);
            }
            ProviderEvent::ToolUseStop => {
                if !current_tool_name.is_empty() {
                    msg.add_tool_call(
                        std::mem::take(&mut current_tool_id),
                        std::mem::take(&mut current_tool_name),
                        std::mem::take(&mut current_tool_input),
                    );
                }
            }
            ProviderEvent::Complete {
                finish_reason: fr,
                usage: u,
            } => {
                finish_reason = fr;
                usage = u;
            }
            ProviderEvent::Error { error } => {
                return Err(ProbeError::Provider(error));
            }
        }
    }

    if !current_tool_name.is_empty() {
        msg.add_tool_call(current_tool_id, current_tool_name, current_tool_input);
    }

    Ok((msg, finish_reason, usage))
}
