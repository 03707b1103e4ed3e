//! One full publishing pass.
//!
//! Strictly sequential: records are processed one at a time, end-to-end
//! (state lookup → image resolution → render → write → state update), and
//! the two branch commits happen only after every record is done. Image
//! resolution runs at most once per distinct slug per pass, through an
//! in-memory cache that dies with the pass; nothing about images is
//! persisted between runs.

use crate::assets::{self, DerivedImages};
use crate::catalog::{self, CatalogError, Product};
use crate::commons::ImageSource;
use crate::config::Config;
use crate::imaging::ImageBackend;
use crate::publish::{self, GitError};
use crate::schedule::{self, Disposition, ScheduleError};
use crate::store::{StateStore, StoreError};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::process::Command;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum RunError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("state store error: {0}")]
    Store(#[from] StoreError),
    #[error("scheduling error: {0}")]
    Schedule(#[from] ScheduleError),
    #[error("git error: {0}")]
    Git(#[from] GitError),
}

/// What one pass did, for the log line at the end.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub drafted: usize,
    pub published: usize,
    pub skipped: usize,
}

/// Everything the image pipeline produced for one slug, cached per pass.
#[derive(Debug, Clone, Default)]
struct ResolvedAssets {
    images: DerivedImages,
    metadata: Option<HashMap<String, String>>,
}

/// Execute one complete pass.
///
/// Refuses to do anything when the working tree is dirty: a precondition
/// failure, reported and returned before any side effect.
pub fn run_once(
    config: &Config,
    source: &dyn ImageSource,
    backend: Option<&dyn ImageBackend>,
) -> Result<RunSummary, RunError> {
    if publish::has_uncommitted_changes()? {
        error!("repository has uncommitted changes; commit or stash before running");
        return Ok(RunSummary::default());
    }

    let store = StateStore::open(&config.db_file)?;
    let products = catalog::load_products(&config.csv_file)?;
    if products.is_empty() {
        info!("no products found");
        return Ok(RunSummary::default());
    }

    let today = chrono::Local::now().date_naive();
    let (staging_files, main_files, summary) =
        process_records(config, &store, source, backend, &products, today)?;

    publish::publish_branch(
        config,
        &config.staging_branch,
        &staging_files,
        Some(&format!("Auto-draft {} item(s)", staging_files.len())),
    )?;
    publish::publish_branch(
        config,
        &config.main_branch,
        &main_files,
        Some(&format!("Auto-publish {} item(s)", main_files.len())),
    )?;

    Ok(summary)
}

/// The per-record loop, separated from the git bracketing so it can be
/// exercised directly against temp directories.
fn process_records(
    config: &Config,
    store: &StateStore,
    source: &dyn ImageSource,
    backend: Option<&dyn ImageBackend>,
    products: &[Product],
    today: NaiveDate,
) -> Result<(Vec<String>, Vec<String>, RunSummary), RunError> {
    let mut staging_files = Vec::new();
    let mut main_files = Vec::new();
    let mut summary = RunSummary::default();
    let mut cache: HashMap<String, ResolvedAssets> = HashMap::new();

    for product in products {
        let stored = store.get(&product.slug)?.map(|entry| entry.state);
        let disposition = schedule::decide(stored, product.publish_date, today);

        if disposition == Disposition::AlreadyPublished {
            // Terminal state: no render, no store write, and no image
            // traffic either.
            debug!(slug = %product.slug, "already published");
            summary.skipped += 1;
            continue;
        }

        let resolved = cache
            .entry(product.slug.clone())
            .or_insert_with(|| resolve_assets(source, backend, product, config));

        match disposition {
            Disposition::Draft => {
                let path = schedule::write_draft(
                    store,
                    product,
                    &resolved.images,
                    resolved.metadata.as_ref(),
                    &config.drafts_dir,
                )?;
                staging_files.push(path);
                summary.drafted += 1;
            }
            Disposition::Publish => {
                let files = schedule::write_post(
                    store,
                    product,
                    &resolved.images,
                    resolved.metadata.as_ref(),
                    &config.posts_dir,
                )?;
                main_files.extend(files);
                schedule::prune_stale_draft(&config.drafts_dir, &product.slug);
                summary.published += 1;
            }
            Disposition::AlreadyPublished => unreachable!("handled above"),
        }
    }

    Ok((staging_files, main_files, summary))
}

/// Resolve and materialize one slug's image, degrading at every step.
fn resolve_assets(
    source: &dyn ImageSource,
    backend: Option<&dyn ImageBackend>,
    product: &Product,
    config: &Config,
) -> ResolvedAssets {
    let Some(descriptor) = source.resolve(&product.image_query) else {
        return ResolvedAssets::default();
    };

    let images = match assets::materialize(
        source,
        backend,
        &descriptor,
        &product.slug,
        &config.assets_dir,
    ) {
        Ok(images) => images,
        Err(e) => {
            warn!(slug = %product.slug, error = %e, "image materialization failed; continuing without image");
            DerivedImages::default()
        }
    };

    // Attribution survives a failed download: the search result told us
    // whom to credit even when no pixels arrived.
    ResolvedAssets {
        images,
        metadata: Some(descriptor.metadata),
    }
}

/// Best-effort local site build, for previewing dry-run output.
///
/// Probes for `jekyll` on PATH first; every outcome is a log line, never
/// an error.
pub fn attempt_site_build() -> bool {
    match Command::new("jekyll").arg("--version").output() {
        Err(e) => {
            info!(error = %e, "jekyll not available on PATH; skipping local build");
            return false;
        }
        Ok(output) if !output.status.success() => {
            info!("jekyll not available on PATH; skipping local build");
            return false;
        }
        Ok(_) => {}
    }

    info!("running jekyll build (may take time)");
    match Command::new("jekyll")
        .args(["build", "--source", ".", "--destination", "_site"])
        .output()
    {
        Ok(output) if output.status.success() => {
            info!("jekyll build succeeded; output in _site/");
            true
        }
        Ok(output) => {
            error!(
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "jekyll build failed"
            );
            false
        }
        Err(e) => {
            error!(error = %e, "jekyll build attempt failed");
            false
        }
    }
}
