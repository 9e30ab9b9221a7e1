use thiserror::Error;

/// Transport-level failures.
///
/// These are reported by the transport adapter itself (either synchronously
/// while building a request, or through `FutureCallback::failed` once the
/// exchange has been dispatched) and are forwarded to callers unchanged.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid transport configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport has been shut down")]
    ShutDown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
