//! Client configuration

use std::path::PathBuf;
use std::time::Duration;

/// Default per-character reveal delay
pub const DEFAULT_TYPING_DELAY: Duration = Duration::from_millis(25);

/// Configuration for talking to the agent server
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL, without a trailing slash (e.g., `http://localhost:9000`)
    pub base_url: String,
    pub app_name: String,
    pub user_id: String,
    /// Key under which the session id is cached in the local store
    pub session_key: String,
    pub typing_delay: Duration,
    pub store_path: PathBuf,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".to_string(),
            app_name: "movie-tool-agent".to_string(),
            user_id: "movie_guest".to_string(),
            session_key: "movie_tool_agent_session_id".to_string(),
            typing_delay: DEFAULT_TYPING_DELAY,
            store_path: default_store_path(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("AGENT_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            app_name: std::env::var("AGENT_APP_NAME").unwrap_or(defaults.app_name),
            user_id: std::env::var("AGENT_USER_ID").unwrap_or(defaults.user_id),
            session_key: std::env::var("AGENT_SESSION_KEY").unwrap_or(defaults.session_key),
            typing_delay: std::env::var("AGENT_TYPING_DELAY_MS")
                .ok()
                .and_then(|ms| ms.parse().ok())
                .map_or(defaults.typing_delay, Duration::from_millis),
            store_path: std::env::var("AGENT_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            connect_timeout: std::env::var("AGENT_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|secs| secs.parse().ok())
                .map_or(defaults.connect_timeout, Duration::from_secs),
        }
    }
}

fn default_store_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(format!("{home}/.agent-chat/store.db"))
}
