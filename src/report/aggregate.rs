//! Reducers over the processed-PR list. Each writes one artifact and none
//! of them touch the working tree.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use super::{
    banner, processed_numbers, read_artifact, selection_header, summarize_body, timestamp,
    write_artifact, ArtifactNames, ProcessedEntry, ReportError,
};
use crate::config::RunSettings;
use crate::selection::Selection;
use crate::vcs::{VcsError, VersionControl};

/// Concatenate every per-PR report behind a provenance header.
#[instrument(skip_all, fields(entries = entries.len()))]
pub fn compile_master(
    settings: &RunSettings,
    selection: &Selection,
    entries: &[ProcessedEntry],
) -> Result<PathBuf, ReportError> {
    if entries.is_empty() {
        return Err(ReportError::NoEntries);
    }

    let mut out = banner("PR COMPARISON");
    out.push_str(&selection_header(
        selection,
        &processed_numbers(entries),
        settings.preview_threshold,
    ));
    out.push_str(&format!("Generated: {}\n", timestamp()));
    out.push_str(&format!("Total PRs: {}\n\n", entries.len()));

    for (i, entry) in entries.iter().enumerate() {
        let report = read_artifact(&entry.report_path)?;
        out.push_str(&banner(&format!(
            "[{}/{}] PR #{}: {}",
            i + 1,
            entries.len(),
            entry.record.number,
            entry.record.title
        )));
        out.push_str(&report);
        if !report.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }

    let path = write_artifact(&settings.output_dir, &ArtifactNames::master(&selection.tag()), &out)?;
    info!(path = %path.display(), "wrote master comparison");
    Ok(path)
}

/// One short block per PR pointing at its full report.
#[instrument(skip_all, fields(entries = entries.len()))]
pub fn compile_summaries(
    settings: &RunSettings,
    selection: &Selection,
    entries: &[ProcessedEntry],
) -> Result<PathBuf, ReportError> {
    if entries.is_empty() {
        return Err(ReportError::NoEntries);
    }

    let mut out = banner("PR SUMMARIES");
    out.push_str(&selection_header(
        selection,
        &processed_numbers(entries),
        settings.preview_threshold,
    ));
    out.push_str(&format!("Generated: {}\n", timestamp()));
    out.push_str(&format!("Total PRs: {}\n\n", entries.len()));

    for (i, entry) in entries.iter().enumerate() {
        let record = &entry.record;
        out.push_str(&format!(
            "[{}/{}] PR #{}: {}\n",
            i + 1,
            entries.len(),
            record.number,
            record.title
        ));
        out.push_str(&format!("  Author: {}\n", record.author));
        out.push_str(&format!("  Created: {}\n", record.created_at.to_rfc3339()));
        out.push_str(&format!("  URL: {}\n", record.url));
        out.push_str(&format!("  Summary: {}\n", summarize_body(&record.body)));
        out.push_str(&format!("  Report: {}\n\n", entry.report_path.display()));
    }

    let path = write_artifact(
        &settings.output_dir,
        &ArtifactNames::summaries(&selection.tag()),
        &out,
    )?;
    info!(path = %path.display(), "wrote summaries");
    Ok(path)
}

/// Every file a processed PR's report covers (the changed files present after
/// checkout), as it exists on the base branch.
///
/// Files missing from the base are listed as skipped, not treated as errors.
/// When `master` is given its content is appended at the end.
#[instrument(skip_all, fields(entries = entries.len()))]
pub async fn compile_touched_files(
    settings: &RunSettings,
    selection: &Selection,
    entries: &[ProcessedEntry],
    vcs: &dyn VersionControl,
    master: Option<&Path>,
) -> Result<PathBuf, ReportError> {
    if entries.is_empty() {
        return Err(ReportError::NoEntries);
    }

    let touched: BTreeSet<&str> = entries
        .iter()
        .flat_map(|e| e.files.iter().map(String::as_str))
        .collect();
    let base = &settings.base_branch;

    let mut out = banner("PR TOUCHED FILES");
    out.push_str(&selection_header(
        selection,
        &processed_numbers(entries),
        settings.preview_threshold,
    ));
    out.push_str(&format!("Generated: {}\n", timestamp()));
    out.push_str(&format!("Source: {}\n", base));
    out.push_str(&format!("Touched files: {}\n\n", touched.len()));

    let mut skipped = Vec::new();
    for path in &touched {
        match vcs.show_file_at(base, path).await {
            Ok(content) => {
                out.push_str(&banner(&format!("FILE: {} (from {})", path, base)));
                out.push_str(&content);
                if !content.ends_with('\n') {
                    out.push('\n');
                }
                out.push('\n');
            }
            Err(VcsError::MissingAtRef { .. }) => {
                debug!(path, base = %base, "file not on base, skipping");
                skipped.push(*path);
            }
            Err(e) => {
                warn!(path, error = %e, "could not read file from base, skipping");
                skipped.push(*path);
            }
        }
    }

    if !skipped.is_empty() {
        out.push_str(&format!("Skipped (not present on {}):\n", base));
        for path in &skipped {
            out.push_str(&format!("  - {}\n", path));
        }
        out.push('\n');
    }

    if let Some(master) = master {
        out.push_str(&banner("APPENDED PR COMPARISON"));
        out.push_str(&read_artifact(master)?);
    }

    let path = write_artifact(
        &settings.output_dir,
        &ArtifactNames::touched_files(&selection.tag()),
        &out,
    )?;
    info!(path = %path.display(), files = touched.len(), skipped = skipped.len(), "wrote touched files");
    Ok(path)
}
