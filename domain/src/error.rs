//! Error taxonomy shared by every layer below the presentation edge.

use std::time::Duration;
use thiserror::Error;

pub type ChatResult<T> = std::result::Result<T, ChatError>;

#[derive(Error, Debug)]
pub enum ChatError {
    /// The external inference process could not be started or failed to run.
    #[error("inference process failed: {0}")]
    Invocation(String),

    #[error("inference process timed out after {0:?}")]
    InvocationTimeout(Duration),

    /// Session or transcript file absent.
    #[error("{0} not found")]
    NotFound(String),

    /// Two allocations raced for the same identifier.
    #[error("identifier conflict: {0}")]
    Conflict(String),

    #[error("no active session; create or resume one first")]
    NoActiveSession,

    #[error("transcript {0} is malformed")]
    CorruptTranscript(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Stable machine-readable code carried in structured error responses.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Invocation(_) => "invocation_error",
            Self::InvocationTimeout(_) => "invocation_timeout",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::NoActiveSession => "no_active_session",
            Self::CorruptTranscript(_) => "corrupt_transcript",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
        }
    }

    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Conflict(_) | Self::NoActiveSession => 409,
            Self::Invocation(_) => 502,
            Self::InvocationTimeout(_) => 504,
            _ => 500,
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
