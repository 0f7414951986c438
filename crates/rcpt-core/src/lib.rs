//! Core library for receipt expense extraction.
//!
//! This crate provides:
//! - Upload validation (MIME allow-list, size bound)
//! - The extraction prompt and the expense report data model
//! - Recovery of a JSON object from free-form model text
//! - [`ReceiptExtractor`], which ties the above to an inference backend

pub mod error;
pub mod extract;
pub mod models;

pub use error::{ErrorKind, ExtractionError, RcptError, Result, ValidationError};
pub use extract::{Extraction, JsonLocator, ReceiptExtractor, EXTRACTION_PROMPT};
pub use models::config::RcptConfig;
pub use models::expense::{ExpenseReport, Item, ReceiptInfo, Totals};
pub use models::upload::{ImageMime, UploadedImage, MAX_UPLOAD_BYTES};

/// Re-export of the decimal type used by amounts.
pub use rust_decimal;

/// Re-export inference types.
pub use rcpt_inference::{
    GeminiBackend, GeminiConfig, InferenceBackend, InferenceError, InferenceRequest,
    InferenceResponse, InlineImage,
};
