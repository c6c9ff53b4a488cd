/// Failures of the streaming pipeline.
///
/// Returned from `ChatClient::start` when a session cannot be established and
/// recorded on `SessionOutcome::error` when a running session ends in
/// `SessionState::Failed`. Cancellation is never represented here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Invalid caller input (for example a blank message).
    #[error("validation error: {0}")]
    Validation(String),
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// The request could not be issued or the transport failed.
    #[error("network error: {message}")]
    Network {
        message: String,
        status_code: Option<u16>,
    },
    /// The response has no readable event-stream body.
    #[error("protocol error: {message}")]
    Protocol { message: String },
    /// The server reported a failure in-band through the `error` field.
    #[error("server error: {message}")]
    Server { message: String },
}

impl StreamError {
    /// Creates a network error.
    pub fn network(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Network {
            message: message.into(),
            status_code,
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an in-band server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(message) | Self::Config(message) => message,
            Self::Network { message, .. }
            | Self::Protocol { message }
            | Self::Server { message } => message,
        }
    }

    /// Whether the user should be offered a retry (transport-level failures).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Protocol { .. })
    }
}

/// A single event payload that could not be decoded.
///
/// Decode errors are logged and the frame is skipped; they never leave the
/// event parser.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),
    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// Errors returned by the chat metadata and profile API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Input rejected before any request was made.
    #[error("validation error: {0}")]
    Validation(String),
    /// The request could not be sent or the response could not be read.
    #[error("transport error: {0}")]
    Transport(String),
    /// The server answered with a non-success status.
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    /// The response body did not have the expected shape.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Returns the HTTP status for `Status` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            ApiError::Decode(value.to_string())
        } else {
            ApiError::Transport(value.to_string())
        }
    }
}
