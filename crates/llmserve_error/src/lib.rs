//! Error types for the llmserve workspace.
//!
//! Every library crate returns [`ServeResult`]. Errors carry a [`ServeErrorKind`] and the
//! source location where they were raised, captured with `#[track_caller]`.

use std::time::Duration;

/// Result type used across the llmserve crates.
pub type ServeResult<T> = Result<T, ServeError>;

/// Error kinds for launcher, engine and accumulator operations.
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum ServeErrorKind {
    /// Invalid or missing configuration.
    #[display("Configuration error: {_0}")]
    Config(String),
    /// Model hub access failed.
    #[display("Hub error: {_0}")]
    Hub(String),
    /// Tokenizer could not be loaded or failed to encode/decode.
    #[display("Tokenizer error: {_0}")]
    Tokenizer(String),
    /// The inference engine rejected a request or could not be reached.
    #[display("Engine error: {_0}")]
    Engine(String),
    /// HTTP transport or server failure.
    #[display("HTTP error: {_0}")]
    Http(String),
    /// JSON serialization or parsing failure.
    #[display("JSON error: {_0}")]
    Json(String),
    /// Filesystem or process I/O failure.
    #[display("I/O error: {_0}")]
    Io(String),
    /// A client request failed validation.
    #[display("Invalid request: {_0}")]
    InvalidRequest(String),
    /// A producer update would break a candidate's field invariants.
    #[display("Invalid update: {_0}")]
    InvalidUpdate(String),
    /// A producer addressed a candidate that does not exist.
    #[display("Unknown candidate {index} (request has {candidates})")]
    UnknownCandidate {
        /// Requested candidate index
        index: usize,
        /// Number of candidates on the request
        candidates: usize,
    },
    /// A bounded wait elapsed before the request completed.
    #[display("Timed out after {_0:?}")]
    Timeout(Duration),
}

impl From<std::io::Error> for ServeErrorKind {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ServeErrorKind {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// llmserve error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("llmserve Error: {} at line {} in {}", kind, line, file)]
pub struct ServeError {
    kind: ServeErrorKind,
    line: u32,
    file: &'static str,
}

impl ServeError {
    /// Create a new error with automatic location tracking.
    ///
    /// # Examples
    ///
    /// ```
    /// use llmserve_error::{ServeError, ServeErrorKind};
    ///
    /// let err = ServeError::new(ServeErrorKind::Config("missing model".into()));
    /// assert!(err.to_string().contains("missing model"));
    /// ```
    #[track_caller]
    pub fn new(kind: ServeErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ServeErrorKind {
        &self.kind
    }

    /// Line where the error was raised.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// File where the error was raised.
    pub fn file(&self) -> &'static str {
        self.file
    }
}

impl<T> From<T> for ServeError
where
    T: Into<ServeErrorKind>,
{
    #[track_caller]
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}
