//! Renderable text extraction from frame payloads
//!
//! Known payload shapes, in priority order:
//! 1. `{"content": {"parts": [{"text": ...}, ...]}}` - parts concatenated
//! 2. `{"text": "..."}`
//! 3. `{"content": "..."}` with non-empty content
//!
//! A part's `text` renders when it is a non-empty string, a non-zero number
//! or `true`; anything else in a part contributes nothing.
//!
//! Any other JSON is returned re-serialized; non-JSON is returned unchanged.

use serde::Deserialize;
use serde_json::Value;

/// Payload shapes we know how to render
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    Parts { content: PartsContent },
    Text { text: String },
    ContentText { content: String },
}

#[derive(Debug, Deserialize)]
struct PartsContent {
    parts: Vec<Value>,
}

impl Payload {
    fn into_text(self) -> String {
        match self {
            Payload::Parts { content } => content
                .parts
                .iter()
                .filter_map(|part| part.get("text").and_then(part_text))
                .collect(),
            Payload::Text { text } => text,
            Payload::ContentText { content } => content,
        }
    }
}

fn part_text(text: &Value) -> Option<String> {
    match text {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f.abs() > 0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// Extract human-readable text from a frame payload. Never fails.
pub fn extract(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return raw.to_string();
    };

    // Arrays would otherwise bind positionally to the struct variants
    if !value.is_object() {
        return value.to_string();
    }

    match Payload::deserialize(&value) {
        Ok(Payload::ContentText { content }) if content.is_empty() => value.to_string(),
        Ok(payload) => payload.into_text(),
        Err(_) => value.to_string(),
    }
}
