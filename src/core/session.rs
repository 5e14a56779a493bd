use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::error::SessionError;
use crate::core::event::Event;

pub type SessionState = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub app_name: String,
    pub user_id: String,
    pub id: String,
    pub state: SessionState,
    pub events: Vec<Event>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(app_name: String, user_id: String, id: Option<String>, state: SessionState) -> Self {
        let now = Utc::now();
        Self {
            app_name,
            user_id,
            id: id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            state,
            events: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
pub trait SessionService: Send + Sync {
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: Option<&str>,
        state: SessionState,
    ) -> Result<Session, SessionError>;

    async fn get_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Session, SessionError>;

    async fn list_sessions(&self, app_name: &str, user_id: &str) -> Vec<Session>;

    async fn delete_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<(), SessionError>;

    /// Record an event on the session. Partial events are not stored.
    async fn append_event(&self, session: &Session, event: &Event) -> Result<(), SessionError>;
}
