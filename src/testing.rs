//! In-memory collaborators and fixtures for unit tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::Notify;

use crate::platform::{
    CheckResult, Comment, CommentKind, PlatformError, PrMetadata, PrRecord, ReviewPlatform,
};
use crate::report::ProcessedEntry;
use crate::vcs::{VcsError, VersionControl};

fn metadata(number: u64, title: &str) -> PrMetadata {
    PrMetadata {
        number,
        title: title.to_string(),
        head_branch: format!("branch-{}", number),
        base_branch: "main".to_string(),
        head_sha: format!("sha{}", number),
        author: "alice".to_string(),
        body: format!("Body of PR {}", number),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        url: format!("https://github.com/org/repo/pull/{}", number),
    }
}

pub fn sample_record(number: u64, title: &str, files: &[&str]) -> PrRecord {
    PrRecord::new(
        metadata(number, title),
        files.iter().map(|f| f.to_string()).collect(),
        vec![],
        vec![],
    )
}

pub fn sample_comment(author: &str, hour: u32, body: &str, kind: CommentKind) -> Comment {
    Comment {
        kind,
        author: author.to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 2, hour, 0, 0).unwrap(),
        body: body.to_string(),
        url: "https://github.com/org/repo/pull/1#comment".to_string(),
    }
}

pub fn sample_check(name: &str, conclusion: Option<&str>, run_id: Option<u64>) -> CheckResult {
    CheckResult {
        name: name.to_string(),
        status: "completed".to_string(),
        conclusion: conclusion.map(str::to_string),
        details_url: Some(format!("https://ci.example/{}", name)),
        summary: None,
        run_id,
        log_text: None,
    }
}

/// A processed entry whose report file (holding `report`) is written to `dir`.
pub fn sample_entry(dir: &Path, number: u64, title: &str, files: &[&str], report: &str) -> ProcessedEntry {
    let report_path = dir.join(format!("pr-{}-implementation.txt", number));
    std::fs::write(&report_path, report).unwrap();
    let record = sample_record(number, title, files);
    ProcessedEntry {
        local_branch: record.head_branch.clone(),
        files: record.files.clone(),
        record,
        report_path,
    }
}

#[derive(Default)]
pub struct FakePlatform {
    pub prs: HashMap<u64, (PrMetadata, Vec<String>)>,
    pub comments: HashMap<u64, Vec<Comment>>,
    pub checks: HashMap<u64, Vec<CheckResult>>,
    pub logs: HashMap<u64, String>,
    pub failing_comments: HashSet<u64>,
}

impl FakePlatform {
    pub fn add_pr(&mut self, number: u64, title: &str, files: &[&str]) {
        self.prs.insert(
            number,
            (
                metadata(number, title),
                files.iter().map(|f| f.to_string()).collect(),
            ),
        );
    }
}

#[async_trait]
impl ReviewPlatform for FakePlatform {
    async fn pr_metadata(&self, number: u64) -> Result<PrMetadata, PlatformError> {
        self.prs
            .get(&number)
            .map(|(m, _)| m.clone())
            .ok_or(PlatformError::NotFound(number))
    }

    async fn changed_files(&self, number: u64) -> Result<Vec<String>, PlatformError> {
        self.prs
            .get(&number)
            .map(|(_, f)| f.clone())
            .ok_or(PlatformError::NotFound(number))
    }

    async fn comments(&self, number: u64) -> Result<Vec<Comment>, PlatformError> {
        if self.failing_comments.contains(&number) {
            return Err(PlatformError::Parse("comments unavailable".to_string()));
        }
        Ok(self.comments.get(&number).cloned().unwrap_or_default())
    }

    async fn check_rollup(&self, number: u64, _head_sha: &str) -> Result<Vec<CheckResult>, PlatformError> {
        Ok(self.checks.get(&number).cloned().unwrap_or_default())
    }

    async fn check_log(&self, run_id: u64) -> Result<String, PlatformError> {
        self.logs
            .get(&run_id)
            .cloned()
            .ok_or_else(|| PlatformError::Parse(format!("no log for {}", run_id)))
    }
}

#[derive(Default)]
struct FakeVcsState {
    current: String,
    diff_calls: Vec<(String, String, Vec<String>)>,
    merge_base_calls: Vec<(String, String, Vec<String>)>,
    checkouts: Vec<String>,
}

/// Diffs default to empty; every working-tree file exists unless listed in
/// `missing_on_disk`. With `hang_on_show`, `show_file_at` signals
/// `show_started` and never returns.
#[derive(Default)]
pub struct FakeVcs {
    pub diffs: HashMap<(String, String), String>,
    pub failing_diffs: HashSet<String>,
    pub base_files: HashMap<String, String>,
    pub failing_checkouts: HashSet<u64>,
    pub missing_on_disk: HashSet<String>,
    pub remote: Option<String>,
    pub hang_on_show: bool,
    pub show_started: Notify,
    state: Mutex<FakeVcsState>,
}

impl FakeVcs {
    pub fn diff_calls(&self) -> Vec<(String, String, Vec<String>)> {
        self.state.lock().unwrap().diff_calls.clone()
    }

    pub fn merge_base_calls(&self) -> Vec<(String, String, Vec<String>)> {
        self.state.lock().unwrap().merge_base_calls.clone()
    }

    /// Every branch checked out, in order.
    pub fn checkouts(&self) -> Vec<String> {
        self.state.lock().unwrap().checkouts.clone()
    }

    fn canned_diff(&self, from: &str, to: &str) -> Result<String, VcsError> {
        if self.failing_diffs.contains(from) || self.failing_diffs.contains(to) {
            return Err(VcsError::Command {
                command: "diff".to_string(),
                stderr: "bad revision".to_string(),
            });
        }
        Ok(self
            .diffs
            .get(&(from.to_string(), to.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn fetch_remote(&self, _remote: &str) -> Result<(), VcsError> {
        Ok(())
    }

    async fn checkout_pr_branch(&self, branch: &str, _remote: &str, number: u64) -> Result<String, VcsError> {
        if self.failing_checkouts.contains(&number) {
            return Err(VcsError::Checkout {
                number,
                reason: "no such ref".to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        state.current = branch.to_string();
        state.checkouts.push(branch.to_string());
        Ok(branch.to_string())
    }

    async fn diff(&self, from: &str, to: &str, paths: &[String]) -> Result<String, VcsError> {
        self.state
            .lock()
            .unwrap()
            .diff_calls
            .push((from.to_string(), to.to_string(), paths.to_vec()));
        self.canned_diff(from, to)
    }

    async fn diff_from_merge_base(&self, base: &str, head: &str, paths: &[String]) -> Result<String, VcsError> {
        self.state
            .lock()
            .unwrap()
            .merge_base_calls
            .push((base.to_string(), head.to_string(), paths.to_vec()));
        self.canned_diff(base, head)
    }

    async fn show_file_at(&self, reference: &str, path: &str) -> Result<String, VcsError> {
        if self.hang_on_show {
            self.show_started.notify_one();
            std::future::pending::<()>().await;
        }
        self.base_files
            .get(path)
            .cloned()
            .ok_or_else(|| VcsError::MissingAtRef {
                reference: reference.to_string(),
                path: path.to_string(),
            })
    }

    async fn current_branch(&self) -> Result<String, VcsError> {
        Ok(self.state.lock().unwrap().current.clone())
    }

    async fn checkout(&self, branch: &str) -> Result<(), VcsError> {
        let mut state = self.state.lock().unwrap();
        state.current = branch.to_string();
        state.checkouts.push(branch.to_string());
        Ok(())
    }

    async fn file_exists(&self, path: &str) -> bool {
        !self.missing_on_disk.contains(path)
    }

    async fn remote_url(&self, remote: &str) -> Result<String, VcsError> {
        self.remote.clone().ok_or_else(|| VcsError::Command {
            command: "remote".to_string(),
            stderr: format!("No such remote '{}'", remote),
        })
    }
}
