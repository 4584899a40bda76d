use std::collections::BTreeSet;
use tracing::{info, instrument, warn};

use super::diffstat::{diff_stats, render_stats};
use super::{
    banner, diff_body, processed_numbers, section, selection_header, summarize_body, timestamp,
    write_artifact, ArtifactNames, ProcessedEntry, ReportError, RoundRobinOutput,
};
use crate::config::RunSettings;
use crate::selection::Selection;
use crate::vcs::VersionControl;

/// Every unordered pair of entries, in combination order.
pub fn pairs(entries: &[ProcessedEntry]) -> Vec<(&ProcessedEntry, &ProcessedEntry)> {
    let mut out = Vec::with_capacity(entries.len() * entries.len().saturating_sub(1) / 2);
    for (i, a) in entries.iter().enumerate() {
        for b in &entries[i + 1..] {
            out.push((a, b));
        }
    }
    out
}

/// Diff every pair of processed PRs branch-to-branch and write one artifact
/// per pair plus an index.
///
/// Needs at least two entries; with fewer it warns and writes nothing. A
/// pair whose diff or write fails is left out and noted in the index.
#[instrument(skip_all, fields(entries = entries.len()))]
pub async fn compile_round_robin(
    settings: &RunSettings,
    selection: &Selection,
    entries: &[ProcessedEntry],
    vcs: &dyn VersionControl,
) -> Result<RoundRobinOutput, ReportError> {
    if entries.len() < 2 {
        warn!(entries = entries.len(), "round robin needs at least two processed PRs");
        return Ok(RoundRobinOutput::default());
    }

    let mut output = RoundRobinOutput::default();
    let mut failed = Vec::new();

    for (a, b) in pairs(entries) {
        let (na, nb) = (a.record.number, b.record.number);
        let union: Vec<String> = a
            .files
            .iter()
            .chain(b.files.iter())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let diff = match vcs.diff(&a.local_branch, &b.local_branch, &union).await {
            Ok(diff) => diff,
            Err(e) => {
                warn!(a = na, b = nb, error = %e, "pairwise diff failed, skipping pair");
                failed.push((na, nb));
                continue;
            }
        };

        let content = render_pair(a, b, &union, &diff);
        match write_artifact(&settings.output_dir, &ArtifactNames::pair(na, nb), &content) {
            Ok(path) => output.pair_paths.push(path),
            Err(e) => {
                warn!(a = na, b = nb, error = %e, "failed to write pairwise artifact");
                failed.push((na, nb));
            }
        }
    }

    let index = render_index(settings, selection, entries, &output, &failed);
    let index_path = write_artifact(
        &settings.output_dir,
        &ArtifactNames::round_robin_index(&selection.tag()),
        &index,
    )?;
    info!(pairs = output.pair_paths.len(), failed = failed.len(), path = %index_path.display(), "wrote round robin");
    output.index_path = Some(index_path);
    Ok(output)
}

fn render_pair(a: &ProcessedEntry, b: &ProcessedEntry, files: &[String], diff: &str) -> String {
    let (ra, rb) = (&a.record, &b.record);
    let mut out = banner(&format!("PR #{} VERSUS PR #{}", ra.number, rb.number));
    out.push_str(&format!("Generated: {}\n\n", timestamp()));

    for (label, entry) in [("A", a), ("B", b)] {
        let record = &entry.record;
        out.push_str(&format!("{}: PR #{}: {}\n", label, record.number, record.title));
        out.push_str(&format!("   Branch: {} (local: {})\n", record.head_branch, entry.local_branch));
        out.push_str(&format!("   Author: {}\n", record.author));
        out.push_str(&format!("   URL: {}\n", record.url));
        out.push_str(&format!("   Summary: {}\n", summarize_body(&record.body)));
    }

    out.push_str(&format!("\nCombined files ({}):\n", files.len()));
    for file in files {
        out.push_str(&format!("  - {}\n", file));
    }

    out.push_str(&section(&format!("DIFF ({} -> {})", a.local_branch, b.local_branch)));
    if !diff.trim().is_empty() {
        out.push_str(&render_stats(&diff_stats(diff)));
        out.push('\n');
    }
    out.push_str(&diff_body(diff));
    out
}

fn render_index(
    settings: &RunSettings,
    selection: &Selection,
    entries: &[ProcessedEntry],
    output: &RoundRobinOutput,
    failed: &[(u64, u64)],
) -> String {
    let mut out = banner("PR ROUND ROBIN");
    out.push_str(&selection_header(
        selection,
        &processed_numbers(entries),
        settings.preview_threshold,
    ));
    out.push_str(&format!("Generated: {}\n", timestamp()));
    out.push_str(&format!("Pairwise files ({}):\n", output.pair_paths.len()));
    for path in &output.pair_paths {
        out.push_str(&format!("  - {}\n", path.display()));
    }
    if !failed.is_empty() {
        out.push_str(&format!("Failed pairs ({}):\n", failed.len()));
        for (a, b) in failed {
            out.push_str(&format!("  - #{} versus #{}\n", a, b));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::parse;
    use crate::testing::{sample_entry, FakeVcs};
    use std::path::Path;

    fn settings(dir: &Path) -> RunSettings {
        RunSettings {
            output_dir: dir.to_path_buf(),
            ..RunSettings::default()
        }
    }

    #[test]
    fn test_pairs_count_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let entries: Vec<_> = [3, 1, 2]
            .iter()
            .map(|&n| sample_entry(dir.path(), n, "t", &["f"], "r"))
            .collect();
        let numbers: Vec<(u64, u64)> = pairs(&entries)
            .iter()
            .map(|(a, b)| (a.record.number, b.record.number))
            .collect();
        assert_eq!(numbers, vec![(3, 1), (3, 2), (1, 2)]);
    }

    #[tokio::test]
    async fn test_produces_n_choose_two_files() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let selection = parse("10-13").unwrap();
        let vcs = FakeVcs::default();
        let entries: Vec<_> = (10..=13)
            .map(|n| sample_entry(dir.path(), n, "t", &["shared.rs"], "r"))
            .collect();

        let output = compile_round_robin(&settings, &selection, &entries, &vcs)
            .await
            .unwrap();
        assert_eq!(output.pair_paths.len(), 6);
        for path in &output.pair_paths {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            let parts: Vec<&str> = name
                .trim_start_matches("pr-")
                .trim_end_matches(".txt")
                .split("-versus-")
                .collect();
            let (lo, hi): (u64, u64) = (parts[0].parse().unwrap(), parts[1].parse().unwrap());
            assert!(lo < hi);
        }

        let index = std::fs::read_to_string(output.index_path.unwrap()).unwrap();
        assert!(index.contains("PR numbers (4): 10, 11, 12, 13\n"));
        assert!(!index.contains("Processed canonical"));
        assert!(index.contains("Pairwise files (6):"));
        assert!(index.contains("pr-10-versus-13.txt"));
    }

    #[tokio::test]
    async fn test_fewer_than_two_entries() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let selection = parse("1").unwrap();
        let vcs = FakeVcs::default();
        let entries = vec![sample_entry(dir.path(), 1, "t", &["f"], "r")];
        let before = std::fs::read_dir(dir.path()).unwrap().count();

        let output = compile_round_robin(&settings, &selection, &entries, &vcs)
            .await
            .unwrap();
        assert!(output.pair_paths.is_empty());
        assert!(output.index_path.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), before);

        let output = compile_round_robin(&settings, &selection, &[], &vcs).await.unwrap();
        assert!(output.pair_paths.is_empty());
    }

    #[tokio::test]
    async fn test_pair_diff_uses_union_and_branches() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let selection = parse("1-2").unwrap();
        let mut vcs = FakeVcs::default();
        let a = sample_entry(dir.path(), 1, "One", &["b.rs", "a.rs"], "r1");
        let b = sample_entry(dir.path(), 2, "Two", &["c.rs", "a.rs"], "r2");
        vcs.diffs.insert(
            (a.local_branch.clone(), b.local_branch.clone()),
            "diff --git a/c.rs b/c.rs\n@@ -0,0 +1 @@\n+c\n".to_string(),
        );

        let output = compile_round_robin(&settings, &selection, &[a.clone(), b.clone()], &vcs)
            .await
            .unwrap();
        assert_eq!(
            vcs.diff_calls(),
            vec![(
                a.local_branch.clone(),
                b.local_branch.clone(),
                vec!["a.rs".to_string(), "b.rs".to_string(), "c.rs".to_string()]
            )]
        );

        let content = std::fs::read_to_string(&output.pair_paths[0]).unwrap();
        assert!(content.contains("PR #1 VERSUS PR #2"));
        assert!(content.contains("A: PR #1: One"));
        assert!(content.contains("B: PR #2: Two"));
        assert!(content.contains("Combined files (3):"));
        assert!(content.contains("+c"));
    }

    #[tokio::test]
    async fn test_identical_branches_get_marker() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let selection = parse("1-2").unwrap();
        let vcs = FakeVcs::default();
        let entries = vec![
            sample_entry(dir.path(), 1, "One", &["a.rs"], "r1"),
            sample_entry(dir.path(), 2, "Two", &["a.rs"], "r2"),
        ];

        let output = compile_round_robin(&settings, &selection, &entries, &vcs)
            .await
            .unwrap();
        let content = std::fs::read_to_string(&output.pair_paths[0]).unwrap();
        assert!(content.contains("(no differences)"));
    }

    #[tokio::test]
    async fn test_failed_pair_is_listed_in_index() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let selection = parse("1-3").unwrap();
        let mut vcs = FakeVcs::default();
        let entries: Vec<_> = (1..=3)
            .map(|n| sample_entry(dir.path(), n, "t", &["f"], "r"))
            .collect();
        vcs.failing_diffs.insert(entries[2].local_branch.clone());

        let output = compile_round_robin(&settings, &selection, &entries, &vcs)
            .await
            .unwrap();
        assert_eq!(output.pair_paths.len(), 1);
        let index = std::fs::read_to_string(output.index_path.unwrap()).unwrap();
        assert!(index.contains("Failed pairs (2):"));
        assert!(index.contains("#1 versus #3"));
    }
}
