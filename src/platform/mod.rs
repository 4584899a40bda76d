pub mod github;
pub mod types;

pub use github::{parse_repo_slug, GitHubPlatform, RepoSlug};
pub use types::{CheckResult, Comment, CommentKind, PrMetadata, PrRecord};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("Pull request #{0} not found")]
    NotFound(u64),

    #[error("Unexpected API response: {0}")]
    Parse(String),

    #[error("GitHub token not found in environment")]
    MissingToken,

    #[error("Invalid repository '{0}': expected OWNER/REPO or a GitHub remote URL")]
    InvalidRepository(String),
}

/// Read-only view of the code review platform hosting the PRs.
#[async_trait]
pub trait ReviewPlatform: Send + Sync {
    async fn pr_metadata(&self, number: u64) -> Result<PrMetadata, PlatformError>;

    async fn changed_files(&self, number: u64) -> Result<Vec<String>, PlatformError>;

    /// Issue and review comments, in retrieval order.
    async fn comments(&self, number: u64) -> Result<Vec<Comment>, PlatformError>;

    /// CI checks attached to the PR's head commit.
    async fn check_rollup(&self, number: u64, head_sha: &str)
        -> Result<Vec<CheckResult>, PlatformError>;

    async fn check_log(&self, run_id: u64) -> Result<String, PlatformError>;
}

/// Fetch everything the reports need for one PR.
///
/// Metadata and the changed-file list are required; comments and checks are
/// best effort and degrade to empty lists. Logs are only pulled for failing
/// checks when `include_logs` is set, and a failed log fetch just leaves the
/// log out.
#[instrument(skip(platform))]
pub async fn collect_record(
    platform: &dyn ReviewPlatform,
    number: u64,
    include_logs: bool,
) -> Result<PrRecord, PlatformError> {
    let metadata = platform.pr_metadata(number).await?;
    let files = platform.changed_files(number).await?;
    debug!(title = %metadata.title, files = files.len(), "fetched PR metadata");

    let comments = platform.comments(number).await.unwrap_or_else(|e| {
        warn!(error = %e, "failed to fetch comments, continuing without them");
        Vec::new()
    });

    let mut checks = platform
        .check_rollup(number, &metadata.head_sha)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to fetch checks, continuing without them");
            Vec::new()
        });

    if include_logs {
        for check in checks.iter_mut().filter(|c| c.is_failing()) {
            let Some(run_id) = check.run_id else {
                debug!(check = %check.name, "no run id, skipping log");
                continue;
            };
            match platform.check_log(run_id).await {
                Ok(text) => check.log_text = Some(text),
                Err(e) => warn!(check = %check.name, run_id, error = %e, "failed to fetch check log"),
            }
        }
    }

    Ok(PrRecord::new(metadata, files, comments, checks))
}
