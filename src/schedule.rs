//! The publication state machine.
//!
//! For each record, [`decide`] looks at the stored state and the calendar
//! and picks one of three dispositions:
//!
//! ```text
//! publish_date > today                      → Draft
//! publish_date <= today, stored published   → AlreadyPublished
//! publish_date <= today, otherwise          → Publish
//! ```
//!
//! `today` is captured once at the start of a pass and held fixed; a run
//! that straddles midnight still sees one calendar date.
//!
//! Two things are deliberate and easy to misread as bugs:
//!
//! - Drafts are rewritten on *every* run until their date arrives. The
//!   draft file is a continuously refreshed projection of the CSV, not a
//!   write-once artifact.
//! - `AlreadyPublished` skips unconditionally, even when the CSV row has
//!   changed. Edits to published content are not picked up; republishing
//!   means a new slug.
//!
//! The write helpers preserve the ordering invariant documented in
//! [`crate::store`]: markdown file first, state row second, both inside
//! the same record iteration.

use crate::assets::DerivedImages;
use crate::catalog::Product;
use crate::render;
use crate::store::{PubState, StateStore, StoreError};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state store error: {0}")]
    Store(#[from] StoreError),
}

/// What to do with one record on this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Not due yet: refresh the draft.
    Draft,
    /// Due and not yet published: write the post.
    Publish,
    /// Terminal: skip without touching anything.
    AlreadyPublished,
}

/// The transition rule. Pure; see the module docs for the table.
pub fn decide(stored: Option<PubState>, publish_date: NaiveDate, today: NaiveDate) -> Disposition {
    if publish_date > today {
        return Disposition::Draft;
    }
    if stored == Some(PubState::Published) {
        return Disposition::AlreadyPublished;
    }
    Disposition::Publish
}

/// Render and write a draft, then record state `draft`.
///
/// Returns the written path (repo-relative) for the staging file list.
pub fn write_draft(
    store: &StateStore,
    product: &Product,
    images: &DerivedImages,
    metadata: Option<&HashMap<String, String>>,
    drafts_dir: &Path,
) -> Result<String, ScheduleError> {
    let document = render::render(product, images, metadata, true);
    let path = drafts_dir.join(format!("{}.md", product.slug));
    write_markdown(&path, &document)?;
    store.upsert(&product.slug, PubState::Draft, product.publish_date)?;
    info!(slug = %product.slug, scheduled = %product.publish_date, "prepared draft");
    Ok(site_path(&path))
}

/// Render and write a due post, then record state `published`.
///
/// Returns every path the main-branch commit should carry: the post plus
/// whatever images were materialized.
pub fn write_post(
    store: &StateStore,
    product: &Product,
    images: &DerivedImages,
    metadata: Option<&HashMap<String, String>>,
    posts_dir: &Path,
) -> Result<Vec<String>, ScheduleError> {
    let document = render::render(product, images, metadata, false);
    let filename = format!(
        "{}-{}.md",
        product.publish_date.format("%Y-%m-%d"),
        product.slug
    );
    let path = posts_dir.join(filename);
    write_markdown(&path, &document)?;

    let mut files = vec![site_path(&path)];
    files.extend(images.main.clone());
    files.extend(images.thumb.clone());

    store.upsert(&product.slug, PubState::Published, product.publish_date)?;
    info!(slug = %product.slug, "prepared post for publish");
    Ok(files)
}

/// Drop a leftover working-tree draft once its slug has published.
///
/// Committed draft history on the staging branch is left alone; this only
/// covers dry-run residue and files a crash left behind.
pub fn prune_stale_draft(drafts_dir: &Path, slug: &str) {
    let path = drafts_dir.join(format!("{slug}.md"));
    if !path.exists() {
        return;
    }
    match std::fs::remove_file(&path) {
        Ok(()) => info!(path = %path.display(), "removed stale draft"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove stale draft"),
    }
}

fn write_markdown(path: &Path, document: &render::Document) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, document.to_markdown())?;
    info!(path = %path.display(), "wrote file");
    Ok(())
}

fn site_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::product;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    mod decide {
        use super::*;

        const TODAY: &str = "2026-03-15";

        #[test]
        fn future_date_is_a_draft_whatever_the_state() {
            for stored in [None, Some(PubState::Draft), Some(PubState::Published)] {
                assert_eq!(
                    decide(stored, date("2026-03-16"), date(TODAY)),
                    Disposition::Draft
                );
            }
        }

        #[test]
        fn due_date_publishes_unseen_and_drafted_slugs() {
            assert_eq!(
                decide(None, date("2026-03-15"), date(TODAY)),
                Disposition::Publish
            );
            assert_eq!(
                decide(Some(PubState::Draft), date("2026-03-01"), date(TODAY)),
                Disposition::Publish
            );
        }

        #[test]
        fn the_publish_date_itself_counts_as_due() {
            assert_eq!(
                decide(None, date(TODAY), date(TODAY)),
                Disposition::Publish
            );
        }

        #[test]
        fn published_is_terminal() {
            assert_eq!(
                decide(Some(PubState::Published), date("2026-03-01"), date(TODAY)),
                Disposition::AlreadyPublished
            );
        }
    }

    mod writes {
        use super::*;
        use crate::store::StateStore;

        struct Fixture {
            _dir: tempfile::TempDir,
            store: StateStore,
            drafts: std::path::PathBuf,
            posts: std::path::PathBuf,
        }

        fn fixture() -> Fixture {
            let dir = tempfile::tempdir().unwrap();
            let store = StateStore::open(&dir.path().join("state.db")).unwrap();
            let drafts = dir.path().join("_drafts");
            let posts = dir.path().join("_posts");
            Fixture {
                _dir: dir,
                store,
                drafts,
                posts,
            }
        }

        #[test]
        fn draft_writes_file_and_records_state() {
            let f = fixture();
            let p = product("widget-1", "2026-03-20");

            let path =
                write_draft(&f.store, &p, &DerivedImages::default(), None, &f.drafts).unwrap();

            assert!(path.ends_with("_drafts/widget-1.md"));
            let content = std::fs::read_to_string(f.drafts.join("widget-1.md")).unwrap();
            assert!(content.contains("scheduled_date: 2026-03-20"));

            let entry = f.store.get("widget-1").unwrap().unwrap();
            assert_eq!(entry.state, PubState::Draft);
            assert_eq!(entry.scheduled_date, date("2026-03-20"));
        }

        #[test]
        fn draft_refresh_overwrites_in_place() {
            let f = fixture();
            let mut p = product("widget-1", "2026-03-20");
            write_draft(&f.store, &p, &DerivedImages::default(), None, &f.drafts).unwrap();

            p.title = "Widget One, Renamed".to_string();
            write_draft(&f.store, &p, &DerivedImages::default(), None, &f.drafts).unwrap();

            let content = std::fs::read_to_string(f.drafts.join("widget-1.md")).unwrap();
            assert!(content.contains("Widget One, Renamed"));
            assert_eq!(std::fs::read_dir(&f.drafts).unwrap().count(), 1);
        }

        #[test]
        fn post_filename_carries_the_publish_date() {
            let f = fixture();
            let p = product("widget-1", "2026-03-01");

            let files =
                write_post(&f.store, &p, &DerivedImages::default(), None, &f.posts).unwrap();

            assert_eq!(files.len(), 1);
            assert!(files[0].ends_with("_posts/2026-03-01-widget-1.md"));
            assert!(f.posts.join("2026-03-01-widget-1.md").exists());
            assert_eq!(
                f.store.get("widget-1").unwrap().unwrap().state,
                PubState::Published
            );
        }

        #[test]
        fn post_file_list_includes_materialized_images() {
            let f = fixture();
            let p = product("widget-1", "2026-03-01");
            let images = DerivedImages {
                main: Some("assets/images/widget-1.jpg".to_string()),
                thumb: Some("assets/images/widget-1-thumb.jpg".to_string()),
            };

            let files = write_post(&f.store, &p, &images, None, &f.posts).unwrap();

            assert_eq!(files.len(), 3);
            assert!(files[1].ends_with("widget-1.jpg"));
            assert!(files[2].ends_with("widget-1-thumb.jpg"));
        }

        #[test]
        fn prune_removes_an_existing_draft_and_tolerates_absence() {
            let f = fixture();
            let p = product("widget-1", "2026-03-20");
            write_draft(&f.store, &p, &DerivedImages::default(), None, &f.drafts).unwrap();

            prune_stale_draft(&f.drafts, "widget-1");
            assert!(!f.drafts.join("widget-1.md").exists());

            // Second call is a quiet no-op.
            prune_stale_draft(&f.drafts, "widget-1");
        }
    }
}
