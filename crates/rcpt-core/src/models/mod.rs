//! Data models for receipt extraction.

pub mod config;
pub mod expense;
mod lenient;
pub mod upload;

pub use config::RcptConfig;
pub use expense::ExpenseReport;
pub use upload::{ImageMime, UploadedImage};
