//! Error types delivered to request listeners.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use reqwest::header::HeaderMap;
use thiserror::Error;

use crate::transport::{ResponseMeta, TransportError};

/// Failure category of a delivered error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network I/O failed before any status was received.
    Transport,
    /// The exchange exceeded a configured transport timeout.
    Timeout,
    /// The server answered with status >= 400.
    Status,
    /// The payload could not be decoded.
    Parse,
    /// A hook panicked while the request was being processed.
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::Status => "status",
            Self::Parse => "parse",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Error handed to a request's error listener.
///
/// Cheap to clone so futures can hand the same error to several waiters.
#[derive(Clone)]
pub struct RequestError {
    kind: ErrorKind,
    message: String,
    response: Option<ResponseMeta>,
    content: Option<String>,
    source: Option<Cause>,
}

impl RequestError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            response: None,
            content: None,
            source: None,
        }
    }

    /// Wrap a transport failure, keeping it as the error source.
    pub fn transport(error: TransportError) -> Self {
        let kind = if error.is_timeout() {
            ErrorKind::Timeout
        } else {
            ErrorKind::Transport
        };
        Self::new(kind, error.to_string()).with_source(error)
    }

    /// Error for a response with status >= 400.
    pub fn status(meta: ResponseMeta) -> Self {
        let mut error = Self::new(ErrorKind::Status, format!("server returned status {}", meta.status));
        error.response = Some(meta);
        error
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = Some(content.into());
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn response(&self) -> Option<&ResponseMeta> {
        self.response.as_ref()
    }

    pub fn status_code(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        self.response.as_ref().map(|r| &r.headers)
    }

    /// Decoded error body, when the parser read one.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Underlying transport failure, if this error wraps one.
    pub fn transport_cause(&self) -> Option<&TransportError> {
        self.source.as_deref().and_then(|s| s.downcast_ref::<TransportError>())
    }
}

impl fmt::Debug for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("status", &self.status_code())
            .field("content", &self.content)
            .field("source", &self.source.as_ref().map(|s| s.to_string()))
            .finish()
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl StdError for RequestError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|s| s as &(dyn StdError + 'static))
    }
}

/// Misuse of the queue or of a request handle.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("request {0} was already submitted")]
    AlreadySubmitted(String),

    #[error("cannot change url of request {0}: already in the queue")]
    UrlLocked(String),

    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("failed to spawn dispatcher thread: {0}")]
    Spawn(#[source] std::io::Error),
}
