use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::agent::agent::{run_invocation, InvocationContext, LlmAgent};
use crate::core::error::ProbeError;
use crate::core::event::{Event, USER_AUTHOR};
use crate::core::message::Message;
use crate::core::session::SessionService;

/// Events of one invocation, in emission order. A failure arrives as the
/// last item.
pub type EventStream = ReceiverStream<Result<Event, ProbeError>>;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Drives an agent against sessions held by a session service.
pub struct Runner {
    app_name: String,
    agent: Arc<LlmAgent>,
    session_service: Arc<dyn SessionService>,
    streaming: bool,
}

impl Runner {
    pub fn new(
        app_name: impl Into<String>,
        agent: Arc<LlmAgent>,
        session_service: Arc<dyn SessionService>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            agent,
            session_service,
            streaming: false,
        }
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn agent(&self) -> &LlmAgent {
        &self.agent
    }

    /// Record `new_message` on the session and start the agent on it.
    ///
    /// The session must already exist; a missing one fails here, before any
    /// model call is made.
    pub async fn run(
        &self,
        user_id: &str,
        session_id: &str,
        new_message: Message,
    ) -> Result<EventStream, ProbeError> {
        let mut session = self
            .session_service
            .get_session(&self.app_name, user_id, session_id)
            .await?;

        let invocation_id = format!("e-{}", uuid::Uuid::new_v4());
        let user_event = Event::new(invocation_id.clone(), USER_AUTHOR).with_content(new_message);
        self.session_service
            .append_event(&session, &user_event)
            .await?;
        session.events.push(user_event);

        tracing::debug!(
            app_name = %self.app_name,
            session_id,
            invocation_id = %invocation_id,
            agent = %self.agent.name(),
            "invocation started"
        );

        let ctx = InvocationContext {
            invocation_id,
            session,
            session_service: Arc::clone(&self.session_service),
            streaming: self.streaming,
        };

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let agent = Arc::clone(&self.agent);

        tokio::spawn(async move {
            if let Err(e) = run_invocation(agent, ctx, tx.clone()).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        Ok(ReceiverStream::new(rx))
    }
}
