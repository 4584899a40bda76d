use std::path::PathBuf;

use crate::platform::PrRecord;
use crate::selection::SelectionTag;

/// A PR whose per-PR report was written successfully. The ordered list of
/// these drives every aggregate and pairwise artifact.
#[derive(Debug, Clone)]
pub struct ProcessedEntry {
    pub record: PrRecord,
    /// Local branch the PR was materialized on
    pub local_branch: String,
    /// Changed files present in the working tree after checkout
    pub files: Vec<String>,
    pub report_path: PathBuf,
}

/// Output of the round-robin comparator.
#[derive(Debug, Default)]
pub struct RoundRobinOutput {
    /// One path per pair, in combination order
    pub pair_paths: Vec<PathBuf>,
    /// Index of all pairwise artifacts; `None` when fewer than two entries
    pub index_path: Option<PathBuf>,
}

/// Artifact file names for one selection run.
pub struct ArtifactNames;

impl ArtifactNames {
    pub fn pr_report(number: u64) -> String {
        format!("pr-{}-implementation.txt", number)
    }

    pub fn master(tag: &SelectionTag) -> String {
        format!("pr-comparison-{}.txt", tag)
    }

    pub fn summaries(tag: &SelectionTag) -> String {
        format!("pr-summaries-{}.txt", tag)
    }

    pub fn touched_files(tag: &SelectionTag) -> String {
        format!("pr-touched-files-{}.txt", tag)
    }

    /// Smaller number first regardless of argument order.
    pub fn pair(a: u64, b: u64) -> String {
        format!("pr-{}-versus-{}.txt", a.min(b), a.max(b))
    }

    pub fn round_robin_index(tag: &SelectionTag) -> String {
        format!("pr-round-robin-{}.txt", tag)
    }
}
