use autopress::commons::CommonsClient;
use autopress::config::Config;
use autopress::imaging::RustBackend;
use autopress::run::{self, RunError};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "autopress")]
#[command(about = "Scheduled Jekyll auto-publisher for product posts")]
#[command(long_about = "\
Scheduled Jekyll auto-publisher for product posts

Reads products.csv, fetches an illustration for each record from Wikimedia
Commons, and writes Jekyll markdown: future-dated records become drafts on
the staging branch, due records become posts committed and pushed on the
main branch. A SQLite database remembers which slugs have already been
published so they are never published twice.

CSV header:

  slug,title,short_description,body,tags,affiliate_link,publish_date,image_query

Environment variables (all optional):

  CHECK_INTERVAL     seconds between runs (if set, the process loops)
  MAIN_BRANCH        branch for published posts (default: main)
  STAGING_BRANCH     branch for drafts (default: staging)
  GIT_COMMIT_NAME    git user.name for generated commits
  GIT_COMMIT_EMAIL   git user.email for generated commits
  DRY_RUN            1 = same as --dry-run
  BUILD_JEKYLL       1 = attempt `jekyll build` in dry-run mode")]
#[command(version)]
struct Cli {
    /// Write files but skip all git operations
    #[arg(long)]
    dry_run: bool,

    /// Attempt a local `jekyll build` after the pass (dry-run only)
    #[arg(long)]
    build: bool,

    /// Never attempt a local build, even when BUILD_JEKYLL=1
    #[arg(long, conflicts_with = "build")]
    no_build: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if cli.dry_run {
        config.dry_run = true;
    }
    if cli.build {
        config.build_requested = true;
    }
    if cli.no_build {
        config.build_requested = false;
    }

    init_logging(&config.log_file)?;
    info!(dry_run = config.dry_run, "autopress started");

    let source = CommonsClient::new()?;
    let backend = RustBackend::new();

    match config.check_interval {
        Some(interval) => loop {
            // A failed pass is logged and the loop keeps going; only a
            // clean shutdown (signal) ends a looping process.
            if let Err(e) = run_pass(&config, &source, &backend) {
                error!(error = %e, "run failed");
            }
            std::thread::sleep(interval);
        },
        None => {
            run_pass(&config, &source, &backend)?;
            Ok(())
        }
    }
}

fn run_pass(config: &Config, source: &CommonsClient, backend: &RustBackend) -> Result<(), RunError> {
    let summary = run::run_once(config, source, Some(backend))?;
    info!(
        drafted = summary.drafted,
        published = summary.published,
        skipped = summary.skipped,
        "pass complete"
    );
    if config.dry_run && config.build_requested {
        run::attempt_site_build();
    }
    Ok(())
}

/// Route all diagnostics to an append-only log file.
///
/// `RUST_LOG` overrides the default filter when set.
fn init_logging(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("autopress=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
        .init();
    Ok(())
}
