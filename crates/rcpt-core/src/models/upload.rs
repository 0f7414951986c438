//! Uploaded receipt images and the MIME allow-list.

use std::fmt;
use std::path::Path;

use image::ImageFormat;

use crate::error::ValidationError;

/// Default upload limit: 10 MB.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Image types accepted for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMime {
    /// `image/jpeg` (also accepted as `image/jpg`).
    Jpeg,
    /// `image/png`.
    Png,
    /// `image/webp`.
    Webp,
}

impl ImageMime {
    /// Every declared content type that passes the allow-list.
    pub const ALLOWED: [&'static str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

    /// Parse a declared content type. Case and parameters are ignored.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Guess from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        ImageFormat::from_path(path).ok().and_then(Self::from_format)
    }

    /// Guess from the leading magic bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        image::guess_format(data).ok().and_then(Self::from_format)
    }

    fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::WebP => Some(Self::Webp),
            _ => None,
        }
    }

    /// Canonical MIME type sent to the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }
}

impl fmt::Display for ImageMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A receipt image held in memory for one request or run.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Raw bytes.
    pub data: Vec<u8>,
    /// Parsed type from the allow-list.
    pub mime: ImageMime,
    /// Content type as declared by the client, lowercased.
    pub content_type: String,
    /// Original file name, if the client sent one.
    pub file_name: Option<String>,
}

impl UploadedImage {
    /// Validate and wrap an upload.
    ///
    /// The MIME check runs first so an oversized file of a forbidden type
    /// is reported as a type error.
    pub fn new(
        data: Vec<u8>,
        content_type: &str,
        file_name: Option<String>,
        limit: usize,
    ) -> Result<Self, ValidationError> {
        let mime = ImageMime::from_content_type(content_type)
            .ok_or_else(|| ValidationError::UnsupportedMimeType(content_type.to_string()))?;

        if data.is_empty() {
            return Err(ValidationError::EmptyFile);
        }
        if data.len() > limit {
            return Err(ValidationError::TooLarge {
                size: data.len(),
                limit,
            });
        }

        Ok(Self {
            data,
            mime,
            content_type: content_type.trim().to_ascii_lowercase(),
            file_name,
        })
    }

    /// Load an image from disk, inferring the type from the extension or
    /// the content.
    pub fn from_file(path: &Path, limit: usize) -> crate::Result<Self> {
        let data = std::fs::read(path)?;
        let mime = ImageMime::from_path(path)
            .or_else(|| ImageMime::sniff(&data))
            .ok_or_else(|| {
                ValidationError::UnsupportedMimeType(
                    path.extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or("unknown")
                        .to_string(),
                )
            })?;
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());

        Ok(Self::new(data, mime.as_str(), file_name, limit)?)
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
