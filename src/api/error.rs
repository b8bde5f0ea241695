use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::services::SweepError;

/// Non-standard "client closed request"; used when work was cancelled.
const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    ExternalApiError { service: String, message: String },

    ValidationError(String),

    Conflict(String),

    Cancelled,

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::ExternalApiError { service, message } => write!(f, "{service} error: {message}"),
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::Cancelled => f.write_str("Request cancelled"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::ExternalApiError { service, message } => {
                tracing::warn!("{} API error: {}", service, message);
                (
                    StatusCode::BAD_GATEWAY,
                    format!("{service} request failed: {message}"),
                )
            }
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Cancelled => (
                StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                    .unwrap_or(StatusCode::SERVICE_UNAVAILABLE),
                "Request cancelled".to_string(),
            ),
            Self::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<SweepError> for ApiError {
    fn from(err: SweepError) -> Self {
        match err {
            SweepError::Cancelled => Self::Cancelled,
            SweepError::Catalog(e) if e.is_not_found() => Self::NotFound(e.to_string()),
            SweepError::Catalog(e) => Self::ExternalApiError {
                service: "Catalog".to_string(),
                message: e.to_string(),
            },
            e @ (SweepError::InvalidPayload(_) | SweepError::MoviesNotConfigured) => {
                Self::ValidationError(e.to_string())
            }
            e @ SweepError::Io { .. } => Self::InternalError(e.to_string()),
        }
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientError;
    use reqwest::StatusCode as HttpStatus;

    fn status_of(err: SweepError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn sweep_errors_map_to_statuses() {
        assert_eq!(status_of(SweepError::Cancelled).as_u16(), 499);
        assert_eq!(
            status_of(SweepError::InvalidPayload("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SweepError::MoviesNotConfigured),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(SweepError::Catalog(ClientError::Status {
                operation: "get_series".into(),
                status: HttpStatus::NOT_FOUND,
                body: String::new(),
            })),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(SweepError::Catalog(ClientError::Status {
                operation: "get_series".into(),
                status: HttpStatus::INTERNAL_SERVER_ERROR,
                body: String::new(),
            })),
            StatusCode::BAD_GATEWAY
        );
    }
}
