use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while talking to Sonarr, Radarr or the stream provider.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("{operation} failed: {source}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} returned {status}: {body}")]
    Status {
        operation: String,
        status: StatusCode,
        body: String,
    },

    #[error("failed to decode response of {operation}: {message}")]
    Decode { operation: String, message: String },

    #[error("{operation} failed after {attempts} attempts")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: Box<ClientError>,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn transport(operation: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            operation: operation.into(),
            source,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// HTTP status of the failure, looking through an exhausted retry.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}
