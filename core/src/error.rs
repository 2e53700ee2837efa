//! Error types for the Discourse API client.
//!
//! # Design
//! Three failure classes, one variant each: the transport could not complete
//! the round trip, the server answered with an error status, or a success
//! body could not be decoded. `Http` carries the raw status code and body so
//! callers can inspect exactly what the server said.

use std::fmt;

/// Errors returned by `DiscourseClient` methods.
#[derive(Debug)]
pub enum ApiError {
    /// The HTTP collaborator failed before a response was produced
    /// (DNS, connection, timeout). Propagated, never recovered locally.
    Transport(String),

    /// The server returned a status of 400 or above.
    Http { status: u16, body: String },

    /// A success body declared as JSON could not be parsed, or a response
    /// was missing the field path a method is contracted to unwrap.
    Deserialization(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport(msg) => write!(f, "transport failed: {msg}"),
            ApiError::Http { status, body } => {
                write!(f, "HTTP {status}: {body}")
            }
            ApiError::Deserialization(msg) => {
                write!(f, "deserialization failed: {msg}")
            }
        }
    }
}

impl std::error::Error for ApiError {}
