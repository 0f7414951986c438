//! The receipt extractor.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info};

use rcpt_inference::{GeminiBackend, InferenceBackend, InferenceRequest, InlineImage};

use super::locate::JsonLocator;
use super::prompt::EXTRACTION_PROMPT;
use crate::error::Result;
use crate::models::config::RcptConfig;
use crate::models::expense::ExpenseReport;
use crate::models::upload::{UploadedImage, MAX_UPLOAD_BYTES};

/// Result of a successful extraction.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// The JSON object recovered from the model answer, unmodified.
    pub data: Value,
    /// The model's full answer.
    pub raw_text: String,
    /// Model that answered.
    pub model: String,
    /// Wall time of the whole extraction in milliseconds.
    pub processing_time_ms: u64,
}

impl Extraction {
    /// Typed view of the recovered object.
    pub fn report(&self) -> std::result::Result<ExpenseReport, serde_json::Error> {
        ExpenseReport::from_value(&self.data)
    }
}

/// Turns receipt images into expense report JSON via an inference backend.
///
/// One attempt per call: backend failures are returned unchanged.
#[derive(Clone)]
pub struct ReceiptExtractor {
    backend: Arc<dyn InferenceBackend>,
    locator: JsonLocator,
}

impl ReceiptExtractor {
    /// Create an extractor over an existing backend.
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self {
            backend,
            locator: JsonLocator::default(),
        }
    }

    /// Set the JSON locator strategy.
    pub fn with_locator(mut self, locator: JsonLocator) -> Self {
        self.locator = locator;
        self
    }

    /// Build a Gemini-backed extractor from configuration and the environment.
    pub fn from_config(config: &RcptConfig) -> Result<Self> {
        let backend = GeminiBackend::new(config.gemini_config_from_env()?)?;
        Ok(Self::new(Arc::new(backend)).with_locator(config.extraction.json_locator))
    }

    /// Model requests are sent to.
    pub fn model(&self) -> &str {
        self.backend.model()
    }

    /// Extract an expense report from a validated upload.
    pub async fn extract(&self, image: &UploadedImage) -> Result<Extraction> {
        let start = Instant::now();

        info!(
            "Extracting receipt ({} bytes, {}) with {}",
            image.size(),
            image.mime,
            self.backend.model()
        );

        let request = InferenceRequest::new(EXTRACTION_PROMPT)
            .with_image(InlineImage::new(image.mime.as_str(), image.data.clone()));

        let response = self.backend.generate(&request).await?;
        debug!("Model answered with {} chars", response.text.len());

        let data = self.locator.parse(&response.text)?;
        let processing_time_ms = start.elapsed().as_millis() as u64;

        info!("Extraction finished in {}ms", processing_time_ms);

        Ok(Extraction {
            data,
            raw_text: response.text,
            model: response.model,
            processing_time_ms,
        })
    }

    /// Extract from raw bytes and a declared MIME type.
    pub async fn extract_bytes(&self, data: Vec<u8>, content_type: &str) -> Result<Extraction> {
        let image = UploadedImage::new(data, content_type, None, MAX_UPLOAD_BYTES)?;
        self.extract(&image).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, RcptError};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rcpt_inference::{InferenceError, InferenceResponse};
    use serde_json::json;
    use std::sync::Mutex;

    /// Backend answering from a script and recording requests.
    struct ScriptedBackend {
        answer: std::result::Result<String, fn() -> InferenceError>,
        seen: Mutex<Vec<(String, String, usize)>>,
    }

    impl ScriptedBackend {
        fn answering(text: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(err: fn() -> InferenceError) -> Arc<Self> {
            Arc::new(Self {
                answer: Err(err),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl InferenceBackend for ScriptedBackend {
        async fn generate(
            &self,
            request: &InferenceRequest,
        ) -> rcpt_inference::Result<InferenceResponse> {
            let image = &request.images[0];
            self.seen.lock().unwrap().push((
                request.prompt.clone(),
                image.mime_type.clone(),
                image.len(),
            ));
            match &self.answer {
                Ok(text) => Ok(InferenceResponse {
                    text: text.clone(),
                    model: "scripted".to_string(),
                    finish_reason: None,
                }),
                Err(make) => Err(make()),
            }
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn jpeg() -> UploadedImage {
        UploadedImage::new(vec![0xFF, 0xD8, 0xFF], "image/jpg", Some("r.jpg".into()), 100).unwrap()
    }

    #[tokio::test]
    async fn test_extract_returns_object_verbatim() {
        let backend = ScriptedBackend::answering(
            "Here you go:\n{\"totals\": {\"total\": 9.99, \"currency\": \"EUR\"}, \"note\": [1, 2]}\nDone.",
        );
        let extractor = ReceiptExtractor::new(backend.clone());

        let extraction = extractor.extract(&jpeg()).await.unwrap();

        assert_eq!(
            extraction.data,
            json!({"totals": {"total": 9.99, "currency": "EUR"}, "note": [1, 2]})
        );
        assert_eq!(extraction.model, "scripted");
        assert!(extraction.raw_text.starts_with("Here you go"));

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, EXTRACTION_PROMPT);
        assert_eq!(seen[0].1, "image/jpeg");
        assert_eq!(seen[0].2, 3);
    }

    #[tokio::test]
    async fn test_report_view() {
        let backend = ScriptedBackend::answering(r#"{"receipt_info": {"merchant_name": "Kiosk"}}"#);
        let extraction = ReceiptExtractor::new(backend).extract(&jpeg()).await.unwrap();
        let report = extraction.report().unwrap();
        assert_eq!(report.receipt_info.merchant_name.as_deref(), Some("Kiosk"));
    }

    #[tokio::test]
    async fn test_no_json_in_answer() {
        let backend = ScriptedBackend::answering("The image is too blurry to read.");
        let err = ReceiptExtractor::new(backend).extract(&jpeg()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoJson);
        assert_eq!(err.to_string(), "extraction error: no JSON found in model response");
    }

    #[tokio::test]
    async fn test_malformed_answer() {
        let backend = ScriptedBackend::answering("{\"totals\": {\"total\": }}");
        let err = ReceiptExtractor::new(backend).extract(&jpeg()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[tokio::test]
    async fn test_provider_errors_propagate() {
        let backend = ScriptedBackend::failing(|| InferenceError::QuotaExceeded("daily limit".into()));
        let err = ReceiptExtractor::new(backend.clone()).extract(&jpeg()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Quota);
        // Single attempt.
        assert_eq!(backend.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_extract_bytes_validates_mime() {
        let backend = ScriptedBackend::answering("{}");
        let extractor = ReceiptExtractor::new(backend.clone());

        let err = extractor.extract_bytes(vec![1, 2], "image/gif").await.unwrap_err();
        assert!(matches!(err, RcptError::Validation(_)));
        assert!(backend.seen.lock().unwrap().is_empty());

        let ok = extractor.extract_bytes(vec![1, 2], "image/webp").await.unwrap();
        assert_eq!(ok.data, json!({}));
    }

    #[tokio::test]
    async fn test_greedy_locator() {
        let backend = ScriptedBackend::answering("{\"a\": 1} and {\"b\": 2}");
        let err = ReceiptExtractor::new(backend)
            .with_locator(JsonLocator::Greedy)
            .extract(&jpeg())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
