use chrono::{DateTime, Utc};

/// Pull request metadata as returned by the review platform.
#[derive(Debug, Clone)]
pub struct PrMetadata {
    pub number: u64,
    pub title: String,
    pub head_branch: String,
    pub base_branch: String,
    /// Head commit, needed to look up check runs
    pub head_sha: String,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
}

/// Where a discussion comment was posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    /// Conversation-tab comment
    Issue,
    /// Inline code review comment
    Review,
}

impl std::fmt::Display for CommentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommentKind::Issue => write!(f, "issue"),
            CommentKind::Review => write!(f, "review"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub kind: CommentKind,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub body: String,
    pub url: String,
}

/// One entry of a PR's CI check rollup.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: String,
    /// `None` while the check is still running
    pub conclusion: Option<String>,
    pub details_url: Option<String>,
    pub summary: Option<String>,
    /// Identifier logs can be fetched with, when the platform exposes one
    pub run_id: Option<u64>,
    /// Populated only for non-passing checks with a resolvable run id
    pub log_text: Option<String>,
}

impl CheckResult {
    /// Conclusions that never warrant pulling logs.
    const PASSING: [&'static str; 3] = ["success", "neutral", "skipped"];

    /// True when the check finished with a conclusion other than
    /// success, neutral, or skipped.
    pub fn is_failing(&self) -> bool {
        match self.conclusion.as_deref() {
            Some(conclusion) => !Self::PASSING.contains(&conclusion.to_ascii_lowercase().as_str()),
            None => false,
        }
    }
}

/// Everything collected for a single PR.
#[derive(Debug, Clone)]
pub struct PrRecord {
    pub number: u64,
    pub title: String,
    pub head_branch: String,
    pub base_branch: String,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
    /// Changed paths, relative to the repository root
    pub files: Vec<String>,
    /// Chronological, ties in retrieval order
    pub comments: Vec<Comment>,
    pub checks: Vec<CheckResult>,
}

impl PrRecord {
    pub fn new(
        metadata: PrMetadata,
        files: Vec<String>,
        mut comments: Vec<Comment>,
        checks: Vec<CheckResult>,
    ) -> Self {
        // sort_by_key is stable, so equal timestamps keep retrieval order
        comments.sort_by_key(|c| c.created_at);
        Self {
            number: metadata.number,
            title: metadata.title,
            head_branch: metadata.head_branch,
            base_branch: metadata.base_branch,
            author: metadata.author,
            body: metadata.body,
            created_at: metadata.created_at,
            url: metadata.url,
            files,
            comments,
            checks,
        }
    }
}
