//! Receipt extraction: prompt, JSON recovery and the extractor.

mod extractor;
mod locate;
mod prompt;

pub use extractor::{Extraction, ReceiptExtractor};
pub use locate::JsonLocator;
pub use prompt::EXTRACTION_PROMPT;
