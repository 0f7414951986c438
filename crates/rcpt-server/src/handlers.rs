//! Request handlers.

use axum::{
    Json,
    extract::{FromRequest, Multipart, Request, State, multipart::MultipartError},
    http::{Method, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use rcpt_core::{ImageMime, RcptError, UploadedImage, ValidationError};

use crate::AppState;
use crate::error::{ApiError, ErrorResponse};

/// Multipart field carrying the image.
pub const RECEIPT_FIELD: &str = "receipt";

/// Successful extraction response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiptResponse {
    pub success: bool,
    /// The model's JSON object, unmodified.
    pub data: Value,
    pub metadata: ReceiptMetadata,
}

/// Facts about the upload and the run.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiptMetadata {
    pub original_name: Option<String>,
    pub size: usize,
    pub mime_type: String,
    pub processed_at: DateTime<Utc>,
    pub model: String,
    pub processing_time_ms: u64,
}

/// Liveness probe.
pub async fn health() -> &'static str {
    "OK"
}

/// Accept a receipt upload and return the extracted expense report.
///
/// Checks run in order and the first failure ends the request: method,
/// configuration, content type, form parsing, file presence, MIME type,
/// size, extraction.
pub async fn process_receipt(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ErrorResponse> {
    let expose_details = !state.config.production;
    handle(state, request)
        .await
        .map_err(|e| e.with_details(expose_details))
}

async fn handle(state: AppState, request: Request) -> Result<Response, ApiError> {
    if request.method() == Method::OPTIONS {
        return Ok(StatusCode::OK.into_response());
    }
    if request.method() != Method::POST {
        return Err(ApiError::MethodNotAllowed(request.method().clone()));
    }

    let extractor = state.extractor.clone().ok_or_else(|| {
        RcptError::Config("no inference API key configured".to_string())
    })?;

    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false);
    if !is_multipart {
        return Err(ApiError::bad_request(
            "Content-Type must be multipart/form-data",
        ));
    }

    let mut multipart = Multipart::from_request(request, &state)
        .await
        .map_err(|e| ValidationError::Form(e.body_text()))?;

    let upload = read_receipt(&mut multipart, state.config.max_upload_bytes).await?;

    tracing::info!(
        file_name = ?upload.file_name,
        size = upload.size(),
        mime = %upload.content_type,
        "Processing receipt upload"
    );

    let extraction = extractor.extract(&upload).await?;

    let response = ReceiptResponse {
        success: true,
        data: extraction.data,
        metadata: ReceiptMetadata {
            original_name: upload.file_name,
            size: upload.data.len(),
            mime_type: upload.content_type,
            processed_at: Utc::now(),
            model: extraction.model,
            processing_time_ms: extraction.processing_time_ms,
        },
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Pull the `receipt` field out of the form, enforcing type and size.
async fn read_receipt(multipart: &mut Multipart, limit: usize) -> Result<UploadedImage, ApiError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(RECEIPT_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(|s| s.to_string());
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        // Reject before reading the body.
        if ImageMime::from_content_type(&content_type).is_none() {
            return Err(ValidationError::UnsupportedMimeType(content_type).into());
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
            data.extend_from_slice(&chunk);
            if data.len() > limit {
                tracing::warn!(size = data.len(), limit, "Upload exceeds size limit, aborting");
                return Err(ValidationError::TooLarge {
                    size: data.len(),
                    limit,
                }
                .into());
            }
        }

        return Ok(UploadedImage::new(data, &content_type, file_name, limit)?);
    }

    Err(ValidationError::MissingFile(RECEIPT_FIELD.to_string()).into())
}

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge {
            message: format!("File exceeds the {} MB limit", limit / (1024 * 1024)),
        }
    } else {
        ValidationError::Form(err.body_text()).into()
    }
}
