//! Minimal chart image validation.
//!
//! Real image decoding and compression happen upstream; this layer only
//! rejects payloads that are obviously not chart images before they reach the
//! governance pipeline.

use crate::error::ApiError;

/// Supported chart image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Portable Network Graphics.
    Png,
    /// JPEG.
    Jpeg,
    /// WebP (RIFF container).
    Webp,
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::Webp => write!(f, "webp"),
        }
    }
}

/// Sniffs the image format from magic bytes.
#[must_use]
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(ImageFormat::Png);
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(ImageFormat::Jpeg);
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some(ImageFormat::Webp);
    }
    None
}

/// Validates a decoded chart image payload.
///
/// # Errors
/// Returns error if the payload is empty, exceeds `max_bytes`, or carries no
/// recognizable image signature.
pub fn validate_image(bytes: &[u8], max_bytes: usize) -> Result<ImageFormat, ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::InvalidImage("empty payload".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(ApiError::ImageTooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }
    detect_format(bytes).ok_or_else(|| {
        ApiError::InvalidImage("unrecognized format, expected PNG, JPEG or WebP".to_string())
    })
}
