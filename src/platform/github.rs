use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::types::{CheckResult, Comment, CommentKind, PrMetadata};
use super::{PlatformError, ReviewPlatform};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// GitHub caps `per_page` at 100.
const PAGE_SIZE: usize = 100;
/// The files endpoint stops at 3000 entries, so 30 pages is enough.
const MAX_PAGES: usize = 30;
/// Only the tail of a job log is kept.
const LOG_TAIL_LINES: usize = 200;

/// Owner and name of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Parse `owner/repo`, an https GitHub URL, or an scp-style ssh remote
/// (`git@github.com:owner/repo.git`).
pub fn parse_repo_slug(input: &str) -> Result<RepoSlug, PlatformError> {
    let invalid = || PlatformError::InvalidRepository(input.to_string());
    let input = input.trim();

    let path = if let Some(rest) = input.strip_prefix("git@") {
        rest.split_once(':').map(|(_, path)| path.to_string()).ok_or_else(invalid)?
    } else if input.contains("://") {
        let parsed = reqwest::Url::parse(input).map_err(|_| invalid())?;
        if parsed.host_str().is_none() {
            return Err(invalid());
        }
        parsed.path().to_string()
    } else {
        input.to_string()
    };

    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.len() != 2 {
        return Err(invalid());
    }

    let repo = segments[1].strip_suffix(".git").unwrap_or(segments[1]);
    if segments[0].is_empty() || repo.is_empty() {
        return Err(invalid());
    }

    Ok(RepoSlug {
        owner: segments[0].to_string(),
        repo: repo.to_string(),
    })
}

/// `ReviewPlatform` backed by the GitHub REST API.
pub struct GitHubPlatform {
    client: reqwest::Client,
    api_url: String,
    slug: RepoSlug,
    token: Option<String>,
}

#[derive(Deserialize)]
struct User {
    login: String,
}

#[derive(Deserialize)]
struct GitRef {
    #[serde(rename = "ref")]
    name: String,
    sha: String,
}

#[derive(Deserialize)]
struct PullResponse {
    number: u64,
    title: String,
    body: Option<String>,
    user: Option<User>,
    created_at: DateTime<Utc>,
    html_url: String,
    head: GitRef,
    base: GitRef,
}

#[derive(Deserialize)]
struct FileEntry {
    filename: String,
}

#[derive(Deserialize)]
struct CommentResponse {
    user: Option<User>,
    created_at: DateTime<Utc>,
    body: Option<String>,
    html_url: String,
}

#[derive(Deserialize)]
struct CheckRunsResponse {
    check_runs: Vec<CheckRun>,
}

#[derive(Deserialize)]
struct CheckRun {
    id: u64,
    name: String,
    status: String,
    conclusion: Option<String>,
    details_url: Option<String>,
    output: Option<CheckOutput>,
    app: Option<CheckApp>,
}

#[derive(Deserialize)]
struct CheckOutput {
    summary: Option<String>,
}

#[derive(Deserialize)]
struct CheckApp {
    slug: Option<String>,
}

fn login(user: Option<User>) -> String {
    user.map(|u| u.login).unwrap_or_else(|| "ghost".to_string())
}

impl GitHubPlatform {
    pub fn new(slug: RepoSlug, api_url: Option<&str>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.unwrap_or(DEFAULT_API_URL).trim_end_matches('/').to_string(),
            slug,
            token,
        }
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_url, self.slug.owner, self.slug.repo, path
        )
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .get(url)
            .header("User-Agent", "pr-compiler")
            .header("Accept", "application/vnd.github+json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, number: u64, url: &str) -> Result<T, PlatformError> {
        let response = self.request(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(PlatformError::NotFound(number));
        }
        let value = response.error_for_status()?.json::<T>().await?;
        Ok(value)
    }

    async fn get_paged<T: DeserializeOwned>(&self, number: u64, path: &str) -> Result<Vec<T>, PlatformError> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let url = format!("{}?per_page={}&page={}", self.repo_url(path), PAGE_SIZE, page);
            let batch: Vec<T> = self.get_json(number, &url).await?;
            let done = batch.len() < PAGE_SIZE;
            items.extend(batch);
            if done {
                break;
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl ReviewPlatform for GitHubPlatform {
    #[instrument(skip(self))]
    async fn pr_metadata(&self, number: u64) -> Result<PrMetadata, PlatformError> {
        debug!("fetching PR metadata from GitHub API");
        let url = self.repo_url(&format!("pulls/{}", number));
        let pull: PullResponse = self.get_json(number, &url).await?;

        Ok(PrMetadata {
            number: pull.number,
            title: pull.title,
            head_branch: pull.head.name,
            base_branch: pull.base.name,
            head_sha: pull.head.sha,
            author: login(pull.user),
            body: pull.body.unwrap_or_default(),
            created_at: pull.created_at,
            url: pull.html_url,
        })
    }

    #[instrument(skip(self))]
    async fn changed_files(&self, number: u64) -> Result<Vec<String>, PlatformError> {
        let files: Vec<FileEntry> = self.get_paged(number, &format!("pulls/{}/files", number)).await?;
        debug!(files = files.len(), "received changed files");
        Ok(files.into_iter().map(|f| f.filename).collect())
    }

    #[instrument(skip(self))]
    async fn comments(&self, number: u64) -> Result<Vec<Comment>, PlatformError> {
        let issue: Vec<CommentResponse> = self
            .get_paged(number, &format!("issues/{}/comments", number))
            .await?;
        let review: Vec<CommentResponse> = self
            .get_paged(number, &format!("pulls/{}/comments", number))
            .await?;
        debug!(issue = issue.len(), review = review.len(), "received comments");

        let tagged = issue
            .into_iter()
            .map(|c| (CommentKind::Issue, c))
            .chain(review.into_iter().map(|c| (CommentKind::Review, c)));

        Ok(tagged
            .map(|(kind, c)| Comment {
                kind,
                author: login(c.user),
                created_at: c.created_at,
                body: c.body.unwrap_or_default(),
                url: c.html_url,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn check_rollup(&self, number: u64, head_sha: &str) -> Result<Vec<CheckResult>, PlatformError> {
        if head_sha.is_empty() {
            return Err(PlatformError::Parse(format!("PR #{} has no head commit", number)));
        }
        let url = format!(
            "{}?per_page={}",
            self.repo_url(&format!("commits/{}/check-runs", head_sha)),
            PAGE_SIZE
        );
        let response: CheckRunsResponse = self.get_json(number, &url).await?;
        debug!(checks = response.check_runs.len(), "received check runs");

        Ok(response
            .check_runs
            .into_iter()
            .map(|run| {
                let from_actions = run
                    .app
                    .and_then(|a| a.slug)
                    .is_some_and(|slug| slug == "github-actions");
                CheckResult {
                    name: run.name,
                    status: run.status,
                    conclusion: run.conclusion,
                    details_url: run.details_url,
                    summary: run.output.and_then(|o| o.summary).filter(|s| !s.trim().is_empty()),
                    // Actions check-run ids double as job ids
                    run_id: from_actions.then_some(run.id),
                    log_text: None,
                }
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn check_log(&self, run_id: u64) -> Result<String, PlatformError> {
        if self.token.is_none() {
            return Err(PlatformError::MissingToken);
        }
        let url = self.repo_url(&format!("actions/jobs/{}/logs", run_id));
        let text = self
            .request(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!(log_bytes = text.len(), "received job log");
        Ok(tail_lines(&text, LOG_TAIL_LINES))
    }
}

/// Keep the last `n` lines of `text`.
fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo_slug_forms() {
        let expected = RepoSlug {
            owner: "org".to_string(),
            repo: "repo".to_string(),
        };
        assert_eq!(parse_repo_slug("org/repo").unwrap(), expected);
        assert_eq!(parse_repo_slug("https://github.com/org/repo").unwrap(), expected);
        assert_eq!(parse_repo_slug("https://github.com/org/repo.git").unwrap(), expected);
        assert_eq!(parse_repo_slug("git@github.com:org/repo.git").unwrap(), expected);
        assert_eq!(parse_repo_slug("ssh://git@github.com/org/repo.git").unwrap(), expected);
    }

    #[test]
    fn test_parse_repo_slug_invalid() {
        assert!(parse_repo_slug("").is_err());
        assert!(parse_repo_slug("just-a-name").is_err());
        assert!(parse_repo_slug("https://github.com/org").is_err());
        assert!(parse_repo_slug("https://github.com/org/repo/pull/42").is_err());
        assert!(parse_repo_slug("git@github.com").is_err());
    }

    #[test]
    fn test_slug_display() {
        let slug = parse_repo_slug("org/repo").unwrap();
        assert_eq!(slug.to_string(), "org/repo");
    }

    #[test]
    fn test_tail_lines() {
        assert_eq!(tail_lines("a\nb\nc\nd", 2), "c\nd");
        assert_eq!(tail_lines("a\nb", 5), "a\nb");
        assert_eq!(tail_lines("", 5), "");
    }

    #[test]
    fn test_check_run_deserialize() {
        let json = r#"{"check_runs":[{"id":5,"name":"test","status":"completed","conclusion":"failure",
            "details_url":"https://x","output":{"summary":""},"app":{"slug":"github-actions"}}]}"#;
        let parsed: CheckRunsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.check_runs.len(), 1);
        assert_eq!(parsed.check_runs[0].id, 5);
        assert_eq!(parsed.check_runs[0].conclusion.as_deref(), Some("failure"));
    }

    #[test]
    fn test_pull_response_deserialize() {
        let json = r#"{"number":9,"title":"T","body":null,"user":{"login":"alice"},
            "created_at":"2024-03-01T10:00:00Z","html_url":"https://github.com/o/r/pull/9",
            "head":{"ref":"feature","sha":"abc"},"base":{"ref":"main","sha":"def"}}"#;
        let pull: PullResponse = serde_json::from_str(json).unwrap();
        assert_eq!(pull.head.name, "feature");
        assert_eq!(pull.base.name, "main");
        assert_eq!(login(pull.user), "alice");
        assert!(pull.body.is_none());
    }
}
