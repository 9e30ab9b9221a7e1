//! Error types for API execution

use bridge_traits::{BridgeError, HeaderList, ResponseEnvelope};
use std::fmt;
use thiserror::Error;

use crate::parser::ParseError;

/// Boxed cause of a defect
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Terminal failure of a logical call.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The server answered with a status outside 2xx that was not recovered
    #[error(transparent)]
    Status(#[from] HttpResponseError),

    /// Failure inside the bridge or its collaborators rather than a remote error
    #[error("{context}: {source}")]
    Defect {
        context: String,
        #[source]
        source: BoxError,
    },

    /// Network-level failure reported by the transport
    #[error("Transport error: {0}")]
    Transport(#[from] BridgeError),

    /// The call was cancelled before a terminal outcome
    #[error("Call cancelled")]
    Cancelled,
}

impl ExecutionError {
    pub fn defect(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Defect {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn is_defect(&self) -> bool {
        matches!(self, Self::Defect { .. })
    }

    /// HTTP status of a remote application error
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(e) => Some(e.status),
            _ => None,
        }
    }
}

impl From<ParseError> for ExecutionError {
    fn from(error: ParseError) -> Self {
        Self::defect("Failed to parse response", error)
    }
}

/// An unsuccessful HTTP response: status, reason and headers. The body is
/// never read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseError {
    pub status: u16,
    pub reason: Option<String>,
    pub headers: HeaderList,
}

impl HttpResponseError {
    pub fn from_envelope(envelope: &ResponseEnvelope) -> Self {
        Self {
            status: envelope.status(),
            reason: envelope.reason_phrase().map(str::to_string),
            headers: envelope.headers().clone(),
        }
    }
}

impl fmt::Display for HttpResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "HTTP {} {}", self.status, reason),
            None => write!(f, "HTTP {}", self.status),
        }
    }
}

impl std::error::Error for HttpResponseError {}
