//! Error payload of a failed storage request
//!
//! Every storage operation that does not complete successfully delivers an
//! [`ErrorResponse`]. The sync engine inspects it to tell a missing remote
//! folder (recoverable) apart from genuine failures.
//!
//! ## Design Notes
//!
//! - `interrupted` is set when the request was stopped before the server
//!   answered (connection dropped, transfer aborted).
//! - `failed` is set when the server answered with an error. `body` then
//!   holds the raw response text and `http_status` the status code, if any.
//! - Errors raised by the engine itself (for example "failed to create
//!   remote directory") are `failed` with no status.

use std::fmt::{self, Display, Formatter};

/// Error payload delivered by a failed storage request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// The request was cut short before a response arrived
    pub interrupted: bool,
    /// The server (or the engine) reported a failure
    pub failed: bool,
    /// Raw response body or engine message
    pub body: String,
    /// HTTP status code when the failure came from a server response
    pub http_status: Option<u16>,
}

impl ErrorResponse {
    /// A server-reported failure with its raw body and status code
    #[must_use]
    pub fn failed(body: impl Into<String>, http_status: u16) -> Self {
        Self {
            interrupted: false,
            failed: true,
            body: body.into(),
            http_status: Some(http_status),
        }
    }

    /// A request that was cut short
    #[must_use]
    pub fn interrupted() -> Self {
        Self {
            interrupted: true,
            failed: false,
            body: String::new(),
            http_status: None,
        }
    }

    /// A failure raised locally, carrying a human-readable message
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            interrupted: false,
            failed: true,
            body: message.into(),
            http_status: None,
        }
    }
}

impl Display for ErrorResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.interrupted {
            return write!(f, "request interrupted");
        }
        match self.http_status {
            Some(status) => write!(f, "HTTP {status}: {}", self.body),
            None => write!(f, "{}", self.body),
        }
    }
}

impl std::error::Error for ErrorResponse {}
