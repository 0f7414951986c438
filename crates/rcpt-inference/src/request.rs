//! Request and response types exchanged with inference backends.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// An image sent inline with the prompt.
#[derive(Debug, Clone)]
pub struct InlineImage {
    /// Declared MIME type, e.g. `image/jpeg`.
    pub mime_type: String,
    /// Raw image bytes.
    pub data: Vec<u8>,
}

impl InlineImage {
    /// Create an inline image from raw bytes.
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Standard base64 encoding of the image bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// Size of the image in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the image has no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A single-turn multimodal request.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// Instruction text.
    pub prompt: String,
    /// Images attached after the prompt, in order.
    pub images: Vec<InlineImage>,
}

impl InferenceRequest {
    /// Create a text-only request.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            images: Vec::new(),
        }
    }

    /// Attach an inline image.
    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.images.push(image);
        self
    }
}

/// Free-text answer from a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceResponse {
    /// Generated text, concatenated across parts.
    pub text: String,
    /// Model that produced the answer.
    pub model: String,
    /// Provider-reported finish reason, when present.
    pub finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_image_base64() {
        let image = InlineImage::new("image/png", b"hello".to_vec());
        assert_eq!(image.to_base64(), "aGVsbG8=");
        assert_eq!(image.len(), 5);
        assert!(!image.is_empty());
    }

    #[test]
    fn test_request_builder() {
        let request = InferenceRequest::new("describe")
            .with_image(InlineImage::new("image/jpeg", vec![0xFF, 0xD8]));
        assert_eq!(request.prompt, "describe");
        assert_eq!(request.images.len(), 1);
        assert_eq!(request.images[0].mime_type, "image/jpeg");
    }
}
