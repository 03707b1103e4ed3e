//! Image backend trait and shared types.
//!
//! The parameter structs describe *what* to produce, not *how*; the trait
//! implementation owns the pixel work. This is the seam that keeps the
//! materializer's fallback chain testable without decoding a single byte.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Bounded downscale: fit within `max_width` × `max_height`, preserving
/// aspect ratio, never upscaling.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub max_width: u32,
    pub max_height: u32,
    /// Lossy encoding quality (JPEG only; other formats use encoder defaults).
    pub quality: u8,
}

/// Square thumbnail: scale to cover an `edge` × `edge` box, then
/// center-crop to exactly that square.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub edge: u32,
    pub quality: u8,
}

/// Trait for image processing backends.
pub trait ImageBackend {
    /// Produce the main article image.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;

    /// Produce the square thumbnail.
    fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError>;
}
