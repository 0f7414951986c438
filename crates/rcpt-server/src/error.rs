//! HTTP error mapping.

use axum::{
    Json,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rcpt_core::{ErrorKind, RcptError, ValidationError};

/// Errors a request can end in.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Anything but POST (and OPTIONS, which is answered directly).
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    /// Malformed request.
    #[error("{message}")]
    BadRequest { message: String },

    /// Request body larger than the upload limit.
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// Extraction pipeline failure, classified by kind.
    #[error(transparent)]
    Rcpt(#[from] RcptError),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Rcpt(RcptError::Validation(err))
    }
}

impl ApiError {
    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Rcpt(RcptError::Validation(ValidationError::TooLarge { .. })) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ApiError::Rcpt(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
                ErrorKind::Quota => StatusCode::TOO_MANY_REQUESTS,
                ErrorKind::NoJson | ErrorKind::Parse => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::Config | ErrorKind::Provider | ErrorKind::Internal => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Short error title for the `error` field.
    pub fn title(&self) -> &'static str {
        match self {
            ApiError::MethodNotAllowed(_) => "Method not allowed",
            ApiError::BadRequest { .. } => "Invalid request",
            ApiError::PayloadTooLarge { .. } => "File too large",
            ApiError::Rcpt(RcptError::Validation(ValidationError::TooLarge { .. })) => {
                "File too large"
            }
            ApiError::Rcpt(RcptError::Validation(ValidationError::Form(_))) => "Invalid request",
            ApiError::Rcpt(err) => match err.kind() {
                ErrorKind::Validation => "Invalid file",
                ErrorKind::Config => "Server configuration error",
                ErrorKind::Authentication => "Authentication failed",
                ErrorKind::Quota => "Rate limit exceeded",
                ErrorKind::NoJson | ErrorKind::Parse => "Extraction failed",
                ErrorKind::Provider | ErrorKind::Internal => "Processing failed",
            },
        }
    }

    /// Client-safe message, without internal details.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::MethodNotAllowed(_) => "Only POST requests are accepted".to_string(),
            ApiError::BadRequest { message } | ApiError::PayloadTooLarge { message } => {
                message.clone()
            }
            ApiError::Rcpt(RcptError::Validation(v)) => v.to_string(),
            ApiError::Rcpt(err) => match err.kind() {
                ErrorKind::Config => "The inference service is not configured".to_string(),
                ErrorKind::Authentication => "Invalid API key configuration".to_string(),
                ErrorKind::Quota => "API quota exceeded, please try again later".to_string(),
                ErrorKind::NoJson | ErrorKind::Parse => {
                    "Could not extract structured data from the receipt".to_string()
                }
                _ => "Failed to process receipt".to_string(),
            },
        }
    }

    /// Attach the response policy for internal details.
    pub fn with_details(self, expose: bool) -> ErrorResponse {
        ErrorResponse {
            error: self,
            expose_details: expose,
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// An [`ApiError`] ready to be rendered.
#[derive(Debug)]
pub struct ErrorResponse {
    error: ApiError,
    expose_details: bool,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.error.status_code();

        match &self.error {
            ApiError::Rcpt(_) if status.is_server_error() => {
                tracing::error!("Receipt processing failed: {}", self.error);
            }
            ApiError::Rcpt(_) if status != StatusCode::BAD_REQUEST => {
                tracing::warn!("Receipt processing failed: {}", self.error);
            }
            _ => {
                tracing::debug!("Client error: {}", self.error);
            }
        }

        let details = match &self.error {
            ApiError::Rcpt(err) if self.expose_details => Some(err.to_string()),
            _ => None,
        };

        let body = ErrorBody {
            error: self.error.title().to_string(),
            message: self.error.user_message(),
            details,
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::MethodNotAllowed(_) = self.error {
            response.headers_mut().insert(
                axum::http::header::ALLOW,
                axum::http::HeaderValue::from_static("POST, OPTIONS"),
            );
        }
        response
    }
}
