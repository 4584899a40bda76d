use std::path::PathBuf;
use tracing::{debug, instrument};

use super::diffstat::{diff_stats, render_stats};
use super::{banner, diff_body, section, summarize_body, timestamp, write_artifact, ArtifactNames, ReportError};
use crate::config::RunSettings;
use crate::platform::PrRecord;
use crate::vcs::VersionControl;

/// Indent applied to comment bodies and check logs.
const BODY_INDENT: &str = "    ";

/// Diff the PR's local branch against its merge base with the base branch
/// over `files` and write `pr-{number}-implementation.txt`.
///
/// Fails without writing anything when `files` is empty.
#[instrument(skip_all, fields(pr = record.number, local = %local_branch))]
pub async fn write_pr_report(
    settings: &RunSettings,
    vcs: &dyn VersionControl,
    record: &PrRecord,
    local_branch: &str,
    files: &[String],
) -> Result<PathBuf, ReportError> {
    if files.is_empty() {
        return Err(ReportError::NoFiles(record.number));
    }

    let diff = vcs
        .diff_from_merge_base(&settings.base_branch, local_branch, files)
        .await?;
    debug!(diff_bytes = diff.len(), "computed diff");

    let content = render_pr_report(
        record,
        local_branch,
        files,
        &diff,
        &settings.base_branch,
        settings.include_logs,
    );
    write_artifact(&settings.output_dir, &ArtifactNames::pr_report(record.number), &content)
}

/// Render the report text: metadata header, diff, checks, then comments.
pub fn render_pr_report(
    record: &PrRecord,
    local_branch: &str,
    files: &[String],
    diff: &str,
    base_ref: &str,
    include_logs: bool,
) -> String {
    let mut out = banner(&format!("PR #{}: {}", record.number, record.title));
    out.push_str(&format!("Head branch: {} (local: {})\n", record.head_branch, local_branch));
    out.push_str(&format!("Base branch: {}\n", record.base_branch));
    out.push_str(&format!("Author: {}\n", record.author));
    out.push_str(&format!("Created: {}\n", record.created_at.to_rfc3339()));
    out.push_str(&format!("Report generated: {}\n", timestamp()));
    out.push_str(&format!("URL: {}\n", record.url));
    out.push_str(&format!("Summary: {}\n", summarize_body(&record.body)));
    out.push_str(&format!("Files ({}):\n", files.len()));
    for file in files {
        out.push_str(&format!("  - {}\n", file));
    }

    out.push_str(&section(&format!("DIFF ({}...{})", base_ref, local_branch)));
    if !diff.trim().is_empty() {
        out.push_str(&render_stats(&diff_stats(diff)));
        out.push('\n');
    }
    out.push_str(&diff_body(diff));

    out.push_str(&section(&format!("CHECKS ({})", record.checks.len())));
    if record.checks.is_empty() {
        out.push_str("(no checks)\n");
    }
    for check in &record.checks {
        out.push_str(&format!(
            "- {}: {} / {}\n",
            check.name,
            check.status,
            check.conclusion.as_deref().unwrap_or("pending")
        ));
        if let Some(url) = &check.details_url {
            out.push_str(&format!("  Details: {}\n", url));
        }
        if let Some(summary) = &check.summary {
            out.push_str(&format!("  Summary: {}\n", summarize_body(summary)));
        }
        if include_logs {
            if let Some(log) = &check.log_text {
                out.push_str("  Log:\n");
                push_indented(&mut out, log);
            }
        }
    }

    out.push_str(&section(&format!("COMMENTS ({})", record.comments.len())));
    if record.comments.is_empty() {
        out.push_str("(no comments)\n");
    }
    for (i, comment) in record.comments.iter().enumerate() {
        out.push_str(&format!(
            "[{}] {} at {} ({})\n",
            i + 1,
            comment.author,
            comment.created_at.to_rfc3339(),
            comment.kind
        ));
        out.push_str(&format!("{}URL: {}\n", BODY_INDENT, comment.url));
        if comment.body.trim().is_empty() {
            out.push_str(&format!("{}(no content)\n", BODY_INDENT));
        } else {
            push_indented(&mut out, &comment.body);
        }
        out.push('\n');
    }

    out
}

fn push_indented(out: &mut String, text: &str) {
    for line in text.lines() {
        out.push_str(BODY_INDENT);
        out.push_str(line);
        out.push('\n');
    }
}
