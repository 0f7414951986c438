//! Multimodal inference abstraction layer for rcpt.
//!
//! This crate provides a unified interface for sending a text prompt plus an
//! inline image to a hosted generative model and reading back free text:
//! - [`InferenceBackend`], the seam the extractor is written against
//! - [`GeminiBackend`], the Google Generative Language `generateContent` client

mod backend;
mod error;
mod request;

pub use backend::InferenceBackend;
pub use backend::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, GeminiBackend, GeminiConfig};
pub use error::InferenceError;
pub use request::{InferenceRequest, InferenceResponse, InlineImage};

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
