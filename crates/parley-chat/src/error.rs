//! Error types for the streaming session engine.

/// Errors from splitting the response body into records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("unterminated record exceeds {limit} bytes")]
    BufferOverflow { limit: usize },
}

/// Errors from interpreting a single record payload.
#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    #[error("record is not valid UTF-8: {0}")]
    InvalidEncoding(String),
    #[error("record payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("record payload is not a JSON object")]
    NotAnObject,
}

/// Errors raised by a [`QueryTransport`](crate::transport::QueryTransport).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("request failed: {0}")]
    Connect(String),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("response body failed: {0}")]
    Body(String),
    #[error("request cancelled")]
    Cancelled,
}

/// Rejections from [`SessionController::submit`](crate::controller::SessionController::submit).
///
/// Failures after a query is accepted surface in the transcript and the
/// session outcome instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("query cannot be empty")]
    EmptyQuery,
    #[error("query exceeds maximum length of {0} characters")]
    QueryTooLong(usize),
}
