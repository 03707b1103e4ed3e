//! Pure Rust image processing backend on the `image` crate.
//!
//! Decodes whatever the compiled-in decoders understand (JPEG, PNG, TIFF,
//! WebP), converts to RGB8, resamples with Lanczos3, and encodes by output
//! extension. JPEG honors the requested quality; other formats are written
//! at their encoder defaults. Formats the crate cannot decode (SVG, GIF
//! animations, ...) surface as a [`BackendError`] and are handled by the
//! caller's fallback chain.

use super::backend::{BackendError, ImageBackend, ResizeParams, ThumbnailParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Production backend. Stateless; everything is statically linked.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a source image into RGB8.
///
/// Downloads are trusted for content, not for extension (Commons files
/// occasionally carry one format under another's name), so the format is
/// sniffed from the bytes.
fn load_rgb(path: &Path) -> Result<DynamicImage, BackendError> {
    let decoded = ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("failed to decode {}: {e}", path.display()))
        })?;
    Ok(DynamicImage::ImageRgb8(decoded.to_rgb8()))
}

/// Encode by output extension; JPEG gets the explicit quality.
fn save(image: &DynamicImage, path: &Path, quality: u8) -> Result<(), BackendError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => {
            let file = File::create(path).map_err(BackendError::Io)?;
            let writer = BufWriter::new(file);
            let encoder = JpegEncoder::new_with_quality(writer, quality);
            image.write_with_encoder(encoder).map_err(|e| {
                BackendError::ProcessingFailed(format!("failed to encode {}: {e}", path.display()))
            })
        }
        _ => image.save(path).map_err(|e| {
            BackendError::ProcessingFailed(format!("failed to encode {}: {e}", path.display()))
        }),
    }
}

impl ImageBackend for RustBackend {
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let image = load_rgb(&params.source)?;
        // Downscale only. A source already inside the box is re-encoded
        // as-is rather than blown up.
        let scaled = if image.width() > params.max_width || image.height() > params.max_height {
            image.resize(params.max_width, params.max_height, FilterType::Lanczos3)
        } else {
            image
        };
        save(&scaled, &params.output, params.quality)
    }

    fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError> {
        let image = load_rgb(&params.source)?;
        let thumb = image.resize_to_fill(params.edge, params.edge, FilterType::Lanczos3);
        save(&thumb, &params.output, params.quality)
    }
}
