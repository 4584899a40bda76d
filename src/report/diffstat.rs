/// Line counts for one file of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// File path (e.g., "src/auth/config.rs")
    pub path: String,
    pub is_new: bool,
    pub is_deleted: bool,
    pub additions: usize,
    pub deletions: usize,
}

/// Summarize raw `git diff` output per file.
///
/// Each file section starts with `diff --git a/{path} b/{path}`. New files
/// have `--- /dev/null`, deleted files `+++ /dev/null`. Only lines inside a
/// hunk (after an `@@` header) are counted.
pub fn diff_stats(raw_diff: &str) -> Vec<FileStat> {
    let mut files: Vec<FileStat> = Vec::new();
    let mut in_hunk = false;

    for line in raw_diff.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            in_hunk = false;
            let mut parts = rest.split_whitespace();
            let a_path = parts.next().unwrap_or_default();
            let b_path = parts.next().unwrap_or(a_path);
            let path = b_path
                .strip_prefix("b/")
                .or_else(|| a_path.strip_prefix("a/"))
                .unwrap_or(b_path)
                .to_string();
            files.push(FileStat {
                path,
                is_new: false,
                is_deleted: false,
                additions: 0,
                deletions: 0,
            });
            continue;
        }

        let Some(file) = files.last_mut() else {
            continue;
        };

        if line.starts_with("@@") {
            in_hunk = true;
            continue;
        }

        if !in_hunk {
            if line == "--- /dev/null" {
                file.is_new = true;
            } else if line == "+++ /dev/null" {
                file.is_deleted = true;
            }
            continue;
        }

        if line.starts_with('+') {
            file.additions += 1;
        } else if line.starts_with('-') {
            file.deletions += 1;
        }
    }

    files
}

/// Render stats as indented report lines, one per file plus a total.
pub fn render_stats(stats: &[FileStat]) -> String {
    let additions: usize = stats.iter().map(|s| s.additions).sum();
    let deletions: usize = stats.iter().map(|s| s.deletions).sum();

    let mut out = format!(
        "Diff stats: {} file(s), +{} -{}\n",
        stats.len(),
        additions,
        deletions
    );
    for stat in stats {
        let marker = if stat.is_new {
            " (new)"
        } else if stat.is_deleted {
            " (deleted)"
        } else {
            ""
        };
        out.push_str(&format!(
            "  {} +{} -{}{}\n",
            stat.path, stat.additions, stat.deletions, marker
        ));
    }
    out
}
