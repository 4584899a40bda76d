pub mod aggregate;
pub mod diffstat;
pub mod pr_report;
pub mod round_robin;
pub mod types;

pub use aggregate::{compile_master, compile_summaries, compile_touched_files};
pub use pr_report::write_pr_report;
pub use round_robin::compile_round_robin;
pub use types::{ArtifactNames, ProcessedEntry, RoundRobinOutput};

use chrono::Local;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::selection::{canonicalize, Selection};
use crate::vcs::VcsError;

/// Written in place of an empty diff so concatenated reports stay unambiguous.
pub const NO_DIFFERENCES: &str = "(no differences)";
/// Numbers shown at each end of a previewed selection.
const PREVIEW_EDGE: usize = 5;

const HEAVY_RULE: &str =
    "================================================================================";
const LIGHT_RULE: &str =
    "--------------------------------------------------------------------------------";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("PR #{0} has no files present after checkout")]
    NoFiles(u64),

    #[error("No processed PRs to compile")]
    NoEntries,

    #[error("Diff failed: {0}")]
    Diff(#[from] VcsError),
}

/// Write `content` to `dir/name`, creating `dir` if needed.
pub fn write_artifact(dir: &Path, name: &str, content: &str) -> Result<PathBuf, ReportError> {
    let path = dir.join(name);
    std::fs::create_dir_all(dir).map_err(|source| ReportError::FileWrite {
        path: dir.to_path_buf(),
        source,
    })?;
    std::fs::write(&path, content).map_err(|source| ReportError::FileWrite {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), bytes = content.len(), "wrote artifact");
    Ok(path)
}

pub(crate) fn read_artifact(path: &Path) -> Result<String, ReportError> {
    std::fs::read_to_string(path).map_err(|source| ReportError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Collapse all runs of whitespace in a PR body into single spaces, producing
/// a one-line summary. Nothing is dropped.
pub fn summarize_body(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return "(no description)".to_string();
    }
    collapsed
}

/// Provenance lines every aggregate artifact starts with.
///
/// `processed` is what the artifact actually covers. When some requested PRs
/// were skipped it differs from the selection and gets its own lines.
/// Small lists show every number; larger ones show count, bounds, and the
/// first and last few numbers.
pub fn selection_header(selection: &Selection, processed: &[u64], preview_threshold: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("Requested selection: {}\n", selection.requested));
    out.push_str(&format!("Canonical selection: {}\n", selection.canonical));
    out.push_str(&format!("Selection tag: {}\n", selection.tag()));
    out.push_str(&number_lines("PR numbers", &selection.numbers, preview_threshold));

    if processed != selection.numbers.as_slice() {
        out.push_str(&format!("Processed canonical: {}\n", canonicalize(processed)));
        out.push_str(&number_lines("Processed PR numbers", processed, preview_threshold));
    }
    out
}

fn number_lines(label: &str, numbers: &[u64], preview_threshold: usize) -> String {
    if numbers.len() <= preview_threshold {
        return format!("{} ({}): {}\n", label, numbers.len(), join_numbers(numbers));
    }

    let head = &numbers[..PREVIEW_EDGE.min(numbers.len())];
    let tail = &numbers[numbers.len().saturating_sub(PREVIEW_EDGE)..];
    format!(
        "{}: {} total, min {}, max {}\nPreview: {} ... {}\n",
        label,
        numbers.len(),
        numbers.first().copied().unwrap_or_default(),
        numbers.last().copied().unwrap_or_default(),
        join_numbers(head),
        join_numbers(tail)
    )
}

/// Ascending PR numbers of the entries an artifact covers.
pub(crate) fn processed_numbers(entries: &[ProcessedEntry]) -> Vec<u64> {
    let mut numbers: Vec<u64> = entries.iter().map(|e| e.record.number).collect();
    numbers.sort_unstable();
    numbers.dedup();
    numbers
}

pub(crate) fn join_numbers(numbers: &[u64]) -> String {
    numbers
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S %z").to_string()
}

pub(crate) fn banner(title: &str) -> String {
    format!("{}\n{}\n{}\n", HEAVY_RULE, title, HEAVY_RULE)
}

pub(crate) fn section(title: &str) -> String {
    format!("\n{}\n{}\n{}\n", LIGHT_RULE, title, LIGHT_RULE)
}

/// Diff text, or the explicit marker when it is blank.
pub(crate) fn diff_body(diff: &str) -> String {
    if diff.trim().is_empty() {
        format!("{}\n", NO_DIFFERENCES)
    } else if diff.ends_with('\n') {
        diff.to_string()
    } else {
        format!("{}\n", diff)
    }
}
