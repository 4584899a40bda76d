pub mod git;

pub use git::GitCli;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("Failed to launch git: {0}")]
    Launch(#[from] std::io::Error),

    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("Failed to check out branch for PR #{number}: {reason}")]
    Checkout { number: u64, reason: String },

    #[error("'{path}' does not exist at {reference}")]
    MissingAtRef { reference: String, path: String },

    #[error("Invalid ref name '{0}'")]
    InvalidRef(String),
}

/// Version-control operations the reports are built from.
///
/// Only one branch can be checked out at a time, so callers must not run
/// `checkout_pr_branch` concurrently. `diff` and `show_file_at` work on refs
/// directly and never touch the working tree.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn fetch_remote(&self, remote: &str) -> Result<(), VcsError>;

    /// Check out `branch` as a local branch, reusing an existing local branch
    /// as is or creating one from `remote`. Falls back to the platform's
    /// `pull/{number}/head` ref when the branch is not usable (absent from the
    /// remote, or a name git refuses). Returns the local branch name.
    async fn checkout_pr_branch(&self, branch: &str, remote: &str, number: u64)
        -> Result<String, VcsError>;

    /// Unified diff from `from` to `to`, restricted to `paths`.
    async fn diff(&self, from: &str, to: &str, paths: &[String]) -> Result<String, VcsError>;

    /// Unified diff of what `head` changed since it forked from `base`,
    /// restricted to `paths`. Commits landing on `base` later do not show up.
    async fn diff_from_merge_base(
        &self,
        base: &str,
        head: &str,
        paths: &[String],
    ) -> Result<String, VcsError>;

    /// File content at `reference`; `VcsError::MissingAtRef` if absent there.
    async fn show_file_at(&self, reference: &str, path: &str) -> Result<String, VcsError>;

    async fn current_branch(&self) -> Result<String, VcsError>;

    async fn checkout(&self, branch: &str) -> Result<(), VcsError>;

    /// Whether `path` exists in the working tree.
    async fn file_exists(&self, path: &str) -> bool;

    async fn remote_url(&self, remote: &str) -> Result<String, VcsError>;
}

/// Reject ref names that could be read as git options or path tricks.
pub fn validate_ref_name(name: &str) -> Result<(), VcsError> {
    let is_valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/' | '.' | '+'))
        && !name.starts_with('-')
        && !name.starts_with('.')
        && !name.contains("..")
        && !name.ends_with('/')
        && !name.ends_with(".lock");

    if is_valid {
        Ok(())
    } else {
        Err(VcsError::InvalidRef(name.to_string()))
    }
}
