//! Transport error types

use thiserror::Error;

/// Transport error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Decode, message)
    }

    pub fn read(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Read, message)
    }

    /// Error for a non-2xx response
    pub fn status(status: u16, body: &str) -> Self {
        let message = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {body}")
        };
        Self {
            kind: TransportErrorKind::Status,
            status: Some(status),
            message,
        }
    }

    /// Classify a failure to send a request
    pub fn from_send(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(format!("Request timeout: {err}"))
        } else if err.is_connect() {
            Self::network(format!("Connection failed: {err}"))
        } else {
            Self::network(format!("Request failed: {err}"))
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self.kind {
            TransportErrorKind::Network | TransportErrorKind::Timeout => true,
            TransportErrorKind::Status => {
                matches!(self.status, Some(429 | 500..=599))
            }
            TransportErrorKind::Decode | TransportErrorKind::Read => false,
        }
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused, DNS failure, reset
    Network,
    /// Request or connect timeout
    Timeout,
    /// Server answered with a non-2xx status
    Status,
    /// Response body was not what we expected
    Decode,
    /// Failure while reading the streamed body
    Read,
}
