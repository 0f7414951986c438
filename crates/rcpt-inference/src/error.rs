//! Error types for the inference layer.

use thiserror::Error;

/// Errors that can occur while calling the inference provider.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// The provider rejected the credential.
    #[error("invalid API key: {0}")]
    Authentication(String),

    /// Rate limit or quota exhausted.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Any other non-success status returned by the provider.
    #[error("provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    /// The provider answered with a body we could not decode.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// The provider answered but produced no text (e.g. blocked by safety filters).
    #[error("provider returned no text{}", .0.as_deref().map(|r| format!(" (finish reason: {r})")).unwrap_or_default())]
    EmptyResponse(Option<String>),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl InferenceError {
    /// Whether the failure is attributable to the credential.
    pub fn is_authentication(&self) -> bool {
        matches!(self, InferenceError::Authentication(_))
    }

    /// Whether the failure is a rate-limit or quota rejection.
    pub fn is_quota(&self) -> bool {
        matches!(self, InferenceError::QuotaExceeded(_))
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InferenceError::Timeout
        } else if err.is_decode() {
            InferenceError::InvalidResponse(err.to_string())
        } else if err.is_builder() {
            InferenceError::InvalidRequest(err.to_string())
        } else {
            InferenceError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_response_message() {
        assert_eq!(
            InferenceError::EmptyResponse(Some("SAFETY".to_string())).to_string(),
            "provider returned no text (finish reason: SAFETY)"
        );
        assert_eq!(
            InferenceError::EmptyResponse(None).to_string(),
            "provider returned no text"
        );
    }

    #[test]
    fn test_kind_predicates() {
        assert!(InferenceError::Authentication("bad".into()).is_authentication());
        assert!(InferenceError::QuotaExceeded("slow down".into()).is_quota());
        assert!(!InferenceError::Timeout.is_quota());
    }
}
