//! Shared fixtures for unit tests.

use crate::catalog::Product;
use crate::commons::{CommonsError, ImageDescriptor, ImageSource};
use crate::config::Config;
use chrono::NaiveDate;
use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;

/// A fully populated product with a fixed title and affiliate link.
pub fn product(slug: &str, publish_date: &str) -> Product {
    Product {
        slug: slug.to_string(),
        title: "Widget One".to_string(),
        short_description: "A short description.".to_string(),
        body: "Long body text.".to_string(),
        tags: vec!["tools".to_string(), "gadgets".to_string()],
        affiliate_link: "https://shop.example/w1".to_string(),
        publish_date: NaiveDate::parse_from_str(publish_date, "%Y-%m-%d").unwrap(),
        image_query: "blue widget".to_string(),
    }
}

/// A config rooted under a temp directory, in dry-run mode.
pub fn test_config(root: &Path) -> Config {
    Config {
        dry_run: true,
        csv_file: root.join("products.csv"),
        db_file: root.join("published.db"),
        log_file: root.join("autopress.log"),
        posts_dir: root.join("_posts"),
        drafts_dir: root.join("_drafts"),
        assets_dir: root.join("assets/images"),
        ..Config::default()
    }
}

enum StubBehavior {
    /// Resolve succeeds; downloads write these bytes.
    Serve(Vec<u8>),
    /// Resolve returns no candidate.
    NotFound,
    /// Resolve succeeds; every download fails.
    FailDownloads,
}

/// Scriptable [`ImageSource`] for pipeline tests.
pub struct StubSource {
    behavior: StubBehavior,
    resolve_calls: Cell<usize>,
}

impl StubSource {
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            behavior: StubBehavior::Serve(bytes),
            resolve_calls: Cell::new(0),
        }
    }

    pub fn not_found() -> Self {
        Self {
            behavior: StubBehavior::NotFound,
            resolve_calls: Cell::new(0),
        }
    }

    pub fn failing_downloads() -> Self {
        Self {
            behavior: StubBehavior::FailDownloads,
            resolve_calls: Cell::new(0),
        }
    }

    /// How many times `resolve` has been called.
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.get()
    }

    fn descriptor() -> ImageDescriptor {
        let mut metadata = HashMap::new();
        metadata.insert("Artist".to_string(), "Stub Artist".to_string());
        ImageDescriptor {
            url: "https://upload.example/widget.jpg".to_string(),
            title: "File:Widget.jpg".to_string(),
            metadata,
        }
    }
}

impl ImageSource for StubSource {
    fn resolve(&self, _query: &str) -> Option<ImageDescriptor> {
        self.resolve_calls.set(self.resolve_calls.get() + 1);
        match self.behavior {
            StubBehavior::NotFound => None,
            _ => Some(Self::descriptor()),
        }
    }

    fn download(&self, _url: &str, dest: &Path) -> Result<(), CommonsError> {
        match &self.behavior {
            StubBehavior::Serve(bytes) => {
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(dest, bytes)?;
                Ok(())
            }
            StubBehavior::NotFound => unreachable!("nothing resolved, nothing to download"),
            StubBehavior::FailDownloads => Err(CommonsError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "stub download failure",
            ))),
        }
    }
}
