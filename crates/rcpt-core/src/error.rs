//! Error types for the rcpt-core library.

use thiserror::Error;

/// Main error type for the rcpt library.
#[derive(Error, Debug)]
pub enum RcptError {
    /// Missing or invalid configuration (e.g. no API key).
    #[error("configuration error: {0}")]
    Config(String),

    /// The upload was rejected before extraction.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The model answered but no report could be recovered.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// The inference call failed.
    #[error("inference error: {0}")]
    Inference(#[from] rcpt_inference::InferenceError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while validating an uploaded image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The multipart form had no file in the expected field.
    #[error("no file uploaded in field '{0}'")]
    MissingFile(String),

    /// The declared MIME type is not in the allow-list.
    #[error("unsupported file type '{0}'; allowed: JPEG, PNG, WebP")]
    UnsupportedMimeType(String),

    /// The file exceeds the size limit.
    #[error("file is {size} bytes; limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    /// The file has no content.
    #[error("uploaded file is empty")]
    EmptyFile,

    /// The request body is not a well-formed multipart form.
    #[error("invalid form data: {0}")]
    Form(String),
}

/// Errors recovering a JSON object from model output.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Nothing resembling a JSON object was found.
    #[error("no JSON found in model response")]
    NoJson,

    /// A candidate object was found but did not parse.
    #[error("failed to parse JSON from model response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Coarse classification used at service boundaries to choose a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Validation,
    NoJson,
    Parse,
    Authentication,
    Quota,
    Provider,
    Internal,
}

impl RcptError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RcptError::Config(_) => ErrorKind::Config,
            RcptError::Validation(_) => ErrorKind::Validation,
            RcptError::Extraction(ExtractionError::NoJson) => ErrorKind::NoJson,
            RcptError::Extraction(ExtractionError::Parse(_)) => ErrorKind::Parse,
            RcptError::Inference(e) if e.is_authentication() => ErrorKind::Authentication,
            RcptError::Inference(e) if e.is_quota() => ErrorKind::Quota,
            RcptError::Inference(_) => ErrorKind::Provider,
            RcptError::Io(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for the rcpt library.
pub type Result<T> = std::result::Result<T, RcptError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rcpt_inference::InferenceError;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            RcptError::from(ExtractionError::NoJson).kind(),
            ErrorKind::NoJson
        );
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(RcptError::from(ExtractionError::from(parse)).kind(), ErrorKind::Parse);
        assert_eq!(
            RcptError::from(InferenceError::Authentication("bad key".into())).kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            RcptError::from(InferenceError::QuotaExceeded("slow".into())).kind(),
            ErrorKind::Quota
        );
        assert_eq!(
            RcptError::from(InferenceError::Timeout).kind(),
            ErrorKind::Provider
        );
        assert_eq!(RcptError::Config("x".into()).kind(), ErrorKind::Config);
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::MissingFile("receipt".into()).to_string(),
            "no file uploaded in field 'receipt'"
        );
        assert_eq!(
            ValidationError::TooLarge { size: 11, limit: 10 }.to_string(),
            "file is 11 bytes; limit is 10 bytes"
        );
    }
}
