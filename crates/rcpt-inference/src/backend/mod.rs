//! Inference backend implementations.

pub mod gemini;

use async_trait::async_trait;

use crate::{InferenceRequest, InferenceResponse, Result};

/// Trait for multimodal inference backends.
///
/// Implementations send one prompt with inline images to a model and return
/// whatever text it produced. They never retry; a failed call is reported
/// as-is so the caller can classify it.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Run a single generation request.
    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResponse>;

    /// Name of the model requests are sent to.
    fn model(&self) -> &str;
}
