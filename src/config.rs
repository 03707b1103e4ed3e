//! Runtime configuration.
//!
//! Every knob lives in one [`Config`] struct built from the environment and
//! then adjusted by CLI flags; nothing reads `std::env` after startup.
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `CHECK_INTERVAL` | seconds between passes; if set, the binary loops |
//! | `MAIN_BRANCH` | branch for published posts (default `main`) |
//! | `STAGING_BRANCH` | branch for drafts (default `staging`) |
//! | `GIT_COMMIT_NAME` | `user.name` override for generated commits |
//! | `GIT_COMMIT_EMAIL` | `user.email` override for generated commits |
//! | `DRY_RUN` | `1` = write files, skip all git operations |
//! | `BUILD_JEKYLL` | `1` = attempt a local `jekyll build` in dry-run mode |

use std::path::PathBuf;
use std::time::Duration;

/// Interval used when `CHECK_INTERVAL` is set but does not parse.
const DEFAULT_INTERVAL_SECS: u64 = 3600;

/// Complete runtime configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Branch that receives published posts.
    pub main_branch: String,
    /// Branch that receives drafts.
    pub staging_branch: String,
    /// `user.name` to apply before committing, when set.
    pub commit_name: Option<String>,
    /// `user.email` to apply before committing, when set.
    pub commit_email: Option<String>,
    /// Write files but perform no git operations.
    pub dry_run: bool,
    /// Attempt a local site build after a dry-run pass.
    pub build_requested: bool,
    /// When set, re-run the whole pass on this interval forever.
    pub check_interval: Option<Duration>,
    /// Input product table.
    pub csv_file: PathBuf,
    /// SQLite publication-state database.
    pub db_file: PathBuf,
    /// Log sink.
    pub log_file: PathBuf,
    /// Directory for published posts (`{date}-{slug}.md`).
    pub posts_dir: PathBuf,
    /// Directory for drafts (`{slug}.md`).
    pub drafts_dir: PathBuf,
    /// Directory for downloaded and derived images.
    pub assets_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            main_branch: "main".to_string(),
            staging_branch: "staging".to_string(),
            commit_name: None,
            commit_email: None,
            dry_run: false,
            build_requested: false,
            check_interval: None,
            csv_file: PathBuf::from("products.csv"),
            db_file: PathBuf::from("published.db"),
            log_file: PathBuf::from("autopress.log"),
            posts_dir: PathBuf::from("_posts"),
            drafts_dir: PathBuf::from("_drafts"),
            assets_dir: PathBuf::from("assets/images"),
        }
    }
}

impl Config {
    /// Build a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    ///
    /// Split out from [`Config::from_env`] so tests can feed variables
    /// without mutating process-global state.
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(branch) = get("MAIN_BRANCH") {
            config.main_branch = branch;
        }
        if let Some(branch) = get("STAGING_BRANCH") {
            config.staging_branch = branch;
        }
        config.commit_name = get("GIT_COMMIT_NAME");
        config.commit_email = get("GIT_COMMIT_EMAIL");
        config.dry_run = get("DRY_RUN").as_deref() == Some("1");
        config.build_requested = get("BUILD_JEKYLL").as_deref() == Some("1");
        // An unparseable interval still means "loop", just hourly.
        config.check_interval = get("CHECK_INTERVAL").map(|raw| {
            Duration::from_secs(raw.trim().parse().unwrap_or(DEFAULT_INTERVAL_SECS))
        });

        config
    }
}
