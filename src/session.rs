//! Session bootstrap and resumption
//!
//! The session id is looked up in memory, then in the local store, and only
//! then created on the server. Store failures never fail the lookup.

use crate::client::{AgentClient, TransportError};
use crate::store::KeyValueStore;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Opaque server-issued session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum SessionCreationError {
    #[error("Session creation failed: {0}")]
    Request(#[source] TransportError),
    #[error("Session creation response carried no session id")]
    MissingId,
}

/// Pull the session id out of a creation response.
///
/// Checks `id`, then `session_id`, then `session.id`. Empty strings, `null`
/// and other non-scalar values are skipped.
pub fn extract_session_id(body: &Value) -> Option<SessionId> {
    [
        body.get("id"),
        body.get("session_id"),
        body.get("session").and_then(|s| s.get("id")),
    ]
    .into_iter()
    .flatten()
    .find_map(|value| match value {
        Value::String(s) if !s.is_empty() => Some(SessionId::new(s.clone())),
        Value::Number(n) => Some(SessionId::new(n.to_string())),
        _ => None,
    })
}

/// Obtains and caches the conversation's session id
pub struct SessionManager<C, K> {
    client: Arc<C>,
    store: K,
    store_key: String,
    app_name: String,
    user_id: String,
    /// Held across the creation request so at most one is in flight
    cached: Mutex<Option<SessionId>>,
}

impl<C, K> SessionManager<C, K>
where
    C: AgentClient,
    K: KeyValueStore,
{
    pub fn new(
        client: Arc<C>,
        store: K,
        store_key: impl Into<String>,
        app_name: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            store_key: store_key.into(),
            app_name: app_name.into(),
            user_id: user_id.into(),
            cached: Mutex::new(None),
        }
    }

    /// Return the session id, creating a session on first use
    pub async fn ensure_session(&self) -> Result<SessionId, SessionCreationError> {
        let mut cached = self.cached.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        match self.store.get(&self.store_key) {
            Ok(Some(saved)) if !saved.is_empty() => {
                tracing::info!(session_id = %saved, "Loaded session id from store");
                let id = SessionId::new(saved);
                *cached = Some(id.clone());
                return Ok(id);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Session store read failed");
            }
        }

        tracing::info!(
            app_name = %self.app_name,
            user_id = %self.user_id,
            "Creating session"
        );
        let body = self
            .client
            .create_session(&self.app_name, &self.user_id)
            .await
            .map_err(SessionCreationError::Request)?;
        let id = extract_session_id(&body).ok_or(SessionCreationError::MissingId)?;

        tracing::info!(session_id = %id, "Created session");
        *cached = Some(id.clone());

        if let Err(e) = self.store.set(&self.store_key, id.as_str()) {
            tracing::warn!(error = %e, "Failed to save session id");
        }

        Ok(id)
    }

    /// Cached id, if one has been established
    pub async fn current(&self) -> Option<SessionId> {
        self.cached.lock().await.clone()
    }

    /// Forget the session so the next turn starts a new one
    pub async fn reset(&self) {
        let mut cached = self.cached.lock().await;
        *cached = None;
        if let Err(e) = self.store.remove(&self.store_key) {
            tracing::warn!(error = %e, "Failed to clear saved session id");
        }
    }
}
