//! Wire types for the agent server

use crate::session::SessionId;
use serde::Serialize;
use serde_json::{Map, Value};

/// Body of a session-creation request
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateSessionRequest {
    pub state: Map<String, Value>,
}

/// Body of a `run_sse` turn request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub new_message: NewMessage,
    pub streaming: bool,
}

impl RunRequest {
    /// A streaming turn carrying a single user text part
    pub fn user_text(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: &SessionId,
        text: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.as_str().to_string(),
            new_message: NewMessage {
                role: "user".to_string(),
                parts: vec![Part { text: text.into() }],
            },
            streaming: true,
        }
    }

    /// Text of the new message, parts concatenated
    pub fn text(&self) -> String {
        self.new_message
            .parts
            .iter()
            .map(|part| part.text.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessage {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    pub text: String,
}
