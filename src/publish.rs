//! Version-control publishing.
//!
//! Thin wrapper over the `git` binary. Every invocation is logged with its
//! argv; failed commands carry trimmed stderr in the error.
//!
//! Failure severity is asymmetric on purpose: a failed `commit` is usually
//! "nothing to commit" and is logged and swallowed, while a failed `push`
//! propagates and aborts the run; the files are already safe in the
//! working tree and the state store, so the next run recovers by pushing
//! the same content again.

use crate::config::Config;
use std::process::{Command, Output};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum GitError {
    #[error("failed to spawn git {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("push to {branch} failed: {stderr}")]
    PushFailed { branch: String, stderr: String },
}

/// Run git, returning the raw output without judging the exit status.
fn run_git(args: &[&str]) -> Result<Output, GitError> {
    debug!(command = %args.join(" "), "running git");
    Command::new("git")
        .args(args)
        .output()
        .map_err(|source| GitError::Spawn {
            command: args.join(" "),
            source,
        })
}

/// Run git and require a zero exit status.
fn run_git_checked(args: &[&str]) -> Result<Output, GitError> {
    let output = run_git(args)?;
    if !output.status.success() {
        return Err(GitError::CommandFailed {
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

/// Anything staged, modified or untracked in the working tree?
pub fn has_uncommitted_changes() -> Result<bool, GitError> {
    let output = run_git(&["status", "--porcelain"])?;
    Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
}

/// Check out `branch`, creating it from the current position when absent.
fn checkout_or_create(branch: &str) -> Result<(), GitError> {
    let probe = run_git(&["rev-parse", "--verify", branch])?;
    if probe.status.success() {
        run_git_checked(&["checkout", branch])?;
    } else {
        run_git_checked(&["checkout", "-b", branch])?;
    }
    // Tracking probe; informational only.
    let _ = run_git(&["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"]);
    Ok(())
}

/// Stage `files`, commit, and push the current branch.
fn commit_and_push(
    config: &Config,
    branch: &str,
    files: &[String],
    message: &str,
) -> Result<(), GitError> {
    let mut add_args = vec!["add"];
    add_args.extend(files.iter().map(String::as_str));
    run_git_checked(&add_args)?;

    if let Some(name) = &config.commit_name {
        run_git_checked(&["config", "user.name", name])?;
    }
    if let Some(email) = &config.commit_email {
        run_git_checked(&["config", "user.email", email])?;
    }

    if let Err(e) = run_git_checked(&["commit", "-m", message]) {
        // Commonly "nothing to commit" on a refresh run; recoverable.
        info!(branch, error = %e, "commit failed, skipping push");
        return Ok(());
    }

    let output = run_git(&["push", "-u", "origin", branch])?;
    if !output.status.success() {
        return Err(GitError::PushFailed {
            branch: branch.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    info!(branch, files = files.len(), "pushed");
    Ok(())
}

/// Commit and push one branch's file list.
///
/// No-op (logged) when the list is empty or dry-run is active; in dry-run
/// the files stay uncommitted in the working tree. Otherwise checks out
/// the branch, commits, pushes, and always returns to the main branch,
/// even when the commit or push failed.
pub fn publish_branch(
    config: &Config,
    branch: &str,
    files: &[String],
    message: Option<&str>,
) -> Result<(), GitError> {
    if files.is_empty() {
        info!(branch, "no files to commit");
        return Ok(());
    }
    if config.dry_run {
        info!(branch, files = ?files, "dry-run: leaving files in working tree");
        return Ok(());
    }

    let generated;
    let message = match message {
        Some(message) => message,
        None => {
            generated = format!("Auto-publish {} file(s)", files.len());
            &generated
        }
    };

    checkout_or_create(branch)?;
    let result = commit_and_push(config, branch, files, message);
    if let Err(e) = run_git(&["checkout", &config.main_branch]) {
        warn!(branch = %config.main_branch, error = %e, "could not return to main branch");
    }
    result
}
