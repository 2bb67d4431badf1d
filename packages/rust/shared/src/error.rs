//! Error types for studygen.
//!
//! Library crates use [`StudyGenError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Generation failures get their own type, [`GenerationError`], because they
//! are values rather than control flow: the pipeline records one per failed
//! mode and keeps going.

use std::path::PathBuf;

use crate::payload::Payload;
use crate::types::ContentMode;

/// Top-level error type for all studygen operations.
#[derive(Debug, thiserror::Error)]
pub enum StudyGenError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error outside a single generation call (client setup).
    #[error("network error: {0}")]
    Network(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad input, unknown mode, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A referenced subject or lesson does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// No user is signed in.
    #[error("not signed in")]
    Unauthenticated,

    /// The operation was cancelled before it finished.
    #[error("operation cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StudyGenError>;

impl StudyGenError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// GenerationError
// ---------------------------------------------------------------------------

/// Why a single generation call produced no payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    /// The input content was empty or whitespace only.
    #[error("content is empty")]
    EmptyContent,

    /// Neither a per-request nor a configured credential was available.
    #[error("missing credential")]
    MissingCredential,

    /// The request never produced an HTTP response (connect, timeout, body read).
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The envelope lacked the expected candidate/text structure.
    #[error("invalid response shape: {0}")]
    Shape(String),

    /// The model text could not be recovered as JSON.
    #[error("parse error: {message}")]
    Parse { message: String, raw: String },

    /// The JSON was well-formed but does not satisfy the mode's schema.
    #[error("invalid {mode} payload: {message}")]
    Validation { mode: ContentMode, message: String },
}

/// Outcome of one generation call.
pub type GenerationResult = std::result::Result<Payload, GenerationError>;

impl GenerationError {
    /// Create a validation error for `mode`.
    pub fn validation(mode: ContentMode, msg: impl Into<String>) -> Self {
        Self::Validation {
            mode,
            message: msg.into(),
        }
    }

    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Only transport-level failures qualify: connection problems, rate
    /// limiting and server errors. Bad model output is never transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// Short machine-readable category name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyContent => "empty_content",
            Self::MissingCredential => "missing_credential",
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::Shape(_) => "shape",
            Self::Parse { .. } => "parse",
            Self::Validation { .. } => "validation",
        }
    }
}
