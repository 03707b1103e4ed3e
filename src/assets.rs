//! Image materialization: turn a resolved descriptor into on-disk assets.
//!
//! Per slug, up to three files land under the assets directory:
//!
//! ```text
//! assets/images/{slug}-orig.{ext}    # raw download, kept as resize source
//! assets/images/{slug}.{ext}         # main article image
//! assets/images/{slug}-thumb.{ext}   # 400×400 center-cropped thumbnail
//! ```
//!
//! Only the download can fail this module's caller. Everything after it is
//! a ranked strategy chain evaluated in order, first success wins:
//!
//! 1. resize pipeline: bounded main image plus square thumbnail;
//! 2. copy-original: the raw download, verbatim, as the main image.
//!
//! So whenever the download succeeds the caller gets a usable main path,
//! with or without an image backend, and a strategy failure is a log line,
//! not an error. Files are overwritten on re-runs, never deleted.

use crate::commons::{CommonsError, ImageDescriptor, ImageSource};
use crate::imaging::{BackendError, ImageBackend, ResizeParams, ThumbnailParams};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

/// Bounding box for the main article image.
const MAIN_MAX_EDGE: u32 = 1200;
/// JPEG quality for the main image.
const MAIN_QUALITY: u8 = 85;
/// Edge of the square thumbnail.
const THUMB_EDGE: u32 = 400;
/// JPEG quality for the thumbnail.
const THUMB_QUALITY: u8 = 80;

#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("image download failed: {0}")]
    Download(#[from] CommonsError),
}

/// Derived asset paths, site-relative with forward slashes.
///
/// Either field may be absent; an imageless record is a valid outcome,
/// not an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedImages {
    pub main: Option<String>,
    pub thumb: Option<String>,
}

static EXT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.([A-Za-z0-9]+)$").unwrap());

/// File extension from a URL's path component; `jpg` when in doubt.
pub fn extension_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            EXT_RE
                .captures(parsed.path())
                .map(|caps| caps[1].to_string())
        })
        .unwrap_or_else(|| "jpg".to_string())
}

/// Download a descriptor's image and derive the publishable assets.
pub fn materialize(
    source: &dyn ImageSource,
    backend: Option<&dyn ImageBackend>,
    descriptor: &ImageDescriptor,
    slug: &str,
    assets_dir: &Path,
) -> Result<DerivedImages, MaterializeError> {
    let ext = extension_from_url(&descriptor.url);
    let orig = assets_dir.join(format!("{slug}-orig.{ext}"));
    let main = assets_dir.join(format!("{slug}.{ext}"));
    let thumb = assets_dir.join(format!("{slug}-thumb.{ext}"));

    source.download(&descriptor.url, &orig)?;
    debug!(path = %orig.display(), "downloaded image");

    Ok(derive_images(backend, &orig, &main, &thumb))
}

/// Run the strategy chain over a downloaded original.
fn derive_images(
    backend: Option<&dyn ImageBackend>,
    orig: &Path,
    main: &Path,
    thumb: &Path,
) -> DerivedImages {
    let resize = backend.map(|backend| ResizePipeline { backend });
    let copy = CopyOriginal;

    let mut chain: Vec<&dyn DeriveStrategy> = Vec::new();
    if let Some(ref strategy) = resize {
        chain.push(strategy);
    }
    chain.push(&copy);

    for strategy in chain {
        match strategy.derive(orig, main, thumb) {
            Ok(derived) => return derived,
            Err(e) => {
                warn!(strategy = strategy.name(), error = %e, "derivation failed, trying next");
            }
        }
    }

    // Every strategy failed (e.g. the filesystem refused the copy); the
    // record proceeds without an image.
    warn!(orig = %orig.display(), "no derivation strategy succeeded");
    DerivedImages::default()
}

/// One way of producing publishable images from the original download.
trait DeriveStrategy {
    fn name(&self) -> &'static str;

    fn derive(&self, orig: &Path, main: &Path, thumb: &Path)
    -> Result<DerivedImages, BackendError>;
}

/// Preferred: bounded main image plus square thumbnail via the backend.
struct ResizePipeline<'a> {
    backend: &'a dyn ImageBackend,
}

impl DeriveStrategy for ResizePipeline<'_> {
    fn name(&self) -> &'static str {
        "resize"
    }

    fn derive(
        &self,
        orig: &Path,
        main: &Path,
        thumb: &Path,
    ) -> Result<DerivedImages, BackendError> {
        self.backend.resize(&ResizeParams {
            source: orig.to_path_buf(),
            output: main.to_path_buf(),
            max_width: MAIN_MAX_EDGE,
            max_height: MAIN_MAX_EDGE,
            quality: MAIN_QUALITY,
        })?;
        self.backend.thumbnail(&ThumbnailParams {
            source: orig.to_path_buf(),
            output: thumb.to_path_buf(),
            edge: THUMB_EDGE,
            quality: THUMB_QUALITY,
        })?;
        Ok(DerivedImages {
            main: Some(site_path(main)),
            thumb: Some(site_path(thumb)),
        })
    }
}

/// Fallback: the raw download, copied (not moved) to the main path.
struct CopyOriginal;

impl DeriveStrategy for CopyOriginal {
    fn name(&self) -> &'static str {
        "copy-original"
    }

    fn derive(
        &self,
        orig: &Path,
        main: &Path,
        _thumb: &Path,
    ) -> Result<DerivedImages, BackendError> {
        std::fs::copy(orig, main).map_err(BackendError::Io)?;
        Ok(DerivedImages {
            main: Some(site_path(main)),
            thumb: None,
        })
    }
}

/// Site-relative path string: forward slashes regardless of platform.
fn site_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
