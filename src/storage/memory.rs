use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::core::error::SessionError;
use crate::core::event::Event;
use crate::core::session::{Session, SessionService, SessionState};

type SessionKey = (String, String, String);

fn key(app_name: &str, user_id: &str, session_id: &str) -> SessionKey {
    (app_name.to_string(), user_id.to_string(), session_id.to_string())
}

fn not_found(app_name: &str, user_id: &str, session_id: &str) -> SessionError {
    SessionError::NotFound {
        app_name: app_name.to_string(),
        user_id: user_id.to_string(),
        session_id: session_id.to_string(),
    }
}

/// Process-local session store. Nothing survives the process.
#[derive(Default)]
pub struct InMemorySessionService {
    sessions: RwLock<HashMap<SessionKey, Session>>,
}

impl InMemorySessionService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionService for InMemorySessionService {
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: Option<&str>,
        state: SessionState,
    ) -> Result<Session, SessionError> {
        let session = Session::new(
            app_name.to_string(),
            user_id.to_string(),
            session_id.map(str::to_string),
            state,
        );

        let mut sessions = self.sessions.write().await;
        let k = key(app_name, user_id, &session.id);
        if sessions.contains_key(&k) {
            return Err(SessionError::AlreadyExists(session.id));
        }
        tracing::debug!(app_name, user_id, session_id = %session.id, "session created");
        sessions.insert(k, session.clone());
        Ok(session)
    }

    async fn get_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Session, SessionError> {
        self.sessions
            .read()
            .await
            .get(&key(app_name, user_id, session_id))
            .cloned()
            .ok_or_else(|| not_found(app_name, user_id, session_id))
    }

    async fn list_sessions(&self, app_name: &str, user_id: &str) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.app_name == app_name && s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    async fn delete_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .remove(&key(app_name, user_id, session_id))
            .map(|_| ())
            .ok_or_else(|| not_found(app_name, user_id, session_id))
    }

    async fn append_event(&self, session: &Session, event: &Event) -> Result<(), SessionError> {
        if event.partial {
            return Ok(());
        }

        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(&key(&session.app_name, &session.user_id, &session.id))
            .ok_or_else(|| not_found(&session.app_name, &session.user_id, &session.id))?;

        tracing::debug!(session_id = %stored.id, author = %event.author, "event appended");
        stored.events.push(event.clone());
        stored.updated_at = Utc::now();
        Ok(())
    }
}
