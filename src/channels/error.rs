//! Per-delivery failure reasons

use crate::types::Channel;
use thiserror::Error;

/// Why a single delivery attempt failed
///
/// Never raised to the caller of an execution; folded into dispatch reports.
#[derive(Debug, Error)]
pub enum SendError {
    /// Channel has no credentials and simulation is disabled
    #[error("{0} channel credentials not configured")]
    NotConfigured(Channel),

    /// Recipient address or number is unusable
    #[error("invalid recipient '{0}'")]
    InvalidRecipient(String),

    /// SMTP server rejected a command
    #[error("SMTP {code}: {message}")]
    Smtp {
        /// Reply code
        code: u16,
        /// Reply text
        message: String,
    },

    /// TLS setup or handshake failed
    #[error("TLS error: {0}")]
    Tls(String),

    /// Socket-level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the connection mid-session
    #[error("connection closed unexpectedly")]
    ConnectionClosed,

    /// Server reply could not be parsed
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An exchange exceeded the configured timeout
    #[error("timed out during {0}")]
    Timeout(&'static str),

    /// Messaging API answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// HTTP request could not be completed
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Job was not attempted because the execution was cancelled
    #[error("cancelled before dispatch")]
    Cancelled,

    /// Job was not attempted because its template is unavailable
    #[error("template unavailable: {0}")]
    TemplateUnavailable(String),
}

impl From<std::str::Utf8Error> for SendError {
    fn from(e: std::str::Utf8Error) -> Self {
        SendError::Protocol(format!("non UTF-8 reply: {e}"))
    }
}
