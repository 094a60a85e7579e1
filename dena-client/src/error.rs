/// Error types for the Deta Base client
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Rejected on the client before any request was sent
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Non-2xx response. `body` is the service's JSON payload, unmodified.
    #[error("Remote error (HTTP {status}): {body}")]
    Remote { status: u16, body: Value },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Returns a stable error code for this error.
    ///
    /// Remote rejections are classified by HTTP status so callers can branch
    /// on the common service conditions without inspecting the payload.
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ClientError::Remote { status, .. } => match status {
                400 => "BAD_REQUEST",
                401 | 403 => "UNAUTHORIZED",
                404 => "NOT_FOUND",
                409 => "ALREADY_EXISTS",
                413 => "PAYLOAD_TOO_LARGE",
                429 => "RATE_LIMITED",
                500..=599 => "SERVER_ERROR",
                _ => "REMOTE_ERROR",
            },
            ClientError::Transport(_) => "TRANSPORT_ERROR",
            ClientError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Returns true if retrying the same call may succeed.
    ///
    /// The client never retries on its own; this is a hint for callers that
    /// wrap it in their own retry loop.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Remote { status, .. } => *status == 429 || *status >= 500,
            ClientError::InvalidArgument(_) => false,
            ClientError::Serialization(_) => false,
        }
    }

    /// HTTP status of a remote rejection
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw JSON payload of a remote rejection
    pub fn body(&self) -> Option<&Value> {
        match self {
            ClientError::Remote { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Messages from the service's `{ "errors": [...] }` envelope.
    ///
    /// Empty when this is not a remote rejection or the payload uses a
    /// different shape.
    pub fn remote_errors(&self) -> Vec<&str> {
        self.body()
            .and_then(|body| body.get("errors"))
            .and_then(Value::as_array)
            .map(|errors| errors.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
