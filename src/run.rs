use colored::Colorize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, info_span, instrument, warn, Instrument};

use crate::config::RunSettings;
use crate::platform::{collect_record, parse_repo_slug, PlatformError, PrRecord, RepoSlug, ReviewPlatform};
use crate::report::{self, ProcessedEntry, ReportError};
use crate::selection::Selection;
use crate::vcs::{VcsError, VersionControl};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Could not determine repository: {0}")]
    Repository(#[from] PlatformError),

    #[error("Could not read remote URL: {0}")]
    Remote(#[from] VcsError),
}

/// Why a requested PR did not make it into the aggregates.
#[derive(Debug, Error)]
pub enum PrProcessError {
    #[error("metadata fetch failed: {0}")]
    MetadataFetch(#[source] PlatformError),

    #[error("checkout failed: {0}")]
    Checkout(#[source] VcsError),

    #[error("none of the {0} changed file(s) exist after checkout")]
    NoExistingFiles(usize),

    #[error("diff failed: {0}")]
    Diff(#[source] VcsError),

    #[error("report write failed: {0}")]
    ArtifactWrite(#[source] ReportError),
}

impl From<ReportError> for PrProcessError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::Diff(e) => PrProcessError::Diff(e),
            other => PrProcessError::ArtifactWrite(other),
        }
    }
}

/// Final accounting for one run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub requested: Vec<u64>,
    pub processed: Vec<u64>,
    /// Requested numbers absent from every aggregate artifact
    pub missing: Vec<u64>,
    pub skipped: Vec<(u64, String)>,
    pub artifacts: Vec<PathBuf>,
    pub artifact_errors: Vec<String>,
    pub interrupted: bool,
}

/// Use the configured `owner/repo`, else derive it from the remote's URL.
pub async fn resolve_repository(
    settings: &RunSettings,
    vcs: &dyn VersionControl,
) -> Result<RepoSlug, RunError> {
    if let Some(repository) = &settings.repository {
        return Ok(parse_repo_slug(repository)?);
    }
    let url = vcs.remote_url(&settings.remote).await?;
    Ok(parse_repo_slug(&url)?)
}

/// Run the whole pipeline, stopping at the first Ctrl-C.
pub async fn run(
    settings: &RunSettings,
    selection: &Selection,
    platform: &dyn ReviewPlatform,
    vcs: &dyn VersionControl,
) -> RunSummary {
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler available; never interrupt.
            std::future::pending::<()>().await;
        }
    };
    run_until(settings, selection, platform, vcs, interrupt).await
}

/// Like [`run`], with the interrupt supplied by the caller.
///
/// Records are fetched concurrently, then each PR is checked out, diffed,
/// and reported one at a time since they share the working tree. Unless
/// cleanup is disabled the base branch is checked out again afterwards,
/// interrupted or not. The interrupt stays armed while the aggregates are
/// written; artifacts finished before it fired are kept.
#[instrument(skip_all, fields(selection = %selection.canonical))]
pub async fn run_until(
    settings: &RunSettings,
    selection: &Selection,
    platform: &dyn ReviewPlatform,
    vcs: &dyn VersionControl,
    interrupt: impl Future<Output = ()>,
) -> RunSummary {
    let mut summary = RunSummary {
        requested: selection.numbers.clone(),
        ..RunSummary::default()
    };
    tokio::pin!(interrupt);

    if let Ok(original) = vcs.current_branch().await {
        info!(branch = %original, "starting from branch");
    }
    if let Err(e) = vcs.fetch_remote(&settings.remote).await {
        warn!(remote = %settings.remote, error = %e, "fetch failed, using existing refs");
    }

    let mut entries = Vec::new();
    let mut skipped = Vec::new();
    summary.interrupted = tokio::select! {
        biased;
        _ = &mut interrupt => {
            warn!("interrupted, abandoning remaining PRs");
            true
        }
        _ = process_all(settings, selection, platform, vcs, &mut entries, &mut skipped) => false,
    };

    if settings.cleanup {
        if let Err(e) = vcs.checkout(&settings.base_branch).await {
            warn!(branch = %settings.base_branch, error = %e, "failed to restore base branch");
        }
    } else {
        info!("cleanup disabled, leaving the last PR branch checked out");
    }

    summary.processed = entries.iter().map(|e| e.record.number).collect();
    summary.skipped = skipped
        .into_iter()
        .map(|(n, e): (u64, PrProcessError)| (n, e.to_string()))
        .collect();
    summary.missing = selection
        .numbers
        .iter()
        .copied()
        .filter(|n| !summary.processed.contains(n))
        .collect();

    if summary.interrupted {
        return summary;
    }

    let interrupted = tokio::select! {
        biased;
        _ = &mut interrupt => {
            warn!("interrupted, abandoning remaining artifacts");
            true
        }
        _ = compile_artifacts(settings, selection, &entries, vcs, &mut summary) => false,
    };
    summary.interrupted = interrupted;
    summary
}

async fn process_all(
    settings: &RunSettings,
    selection: &Selection,
    platform: &dyn ReviewPlatform,
    vcs: &dyn VersionControl,
    entries: &mut Vec<ProcessedEntry>,
    skipped: &mut Vec<(u64, PrProcessError)>,
) {
    let records = fetch_records(settings, selection, platform).await;

    for (number, fetched) in records {
        let outcome = match fetched {
            Ok(record) => process_record(settings, vcs, record)
                .instrument(info_span!("process_pr", pr = number))
                .await,
            Err(e) => Err(PrProcessError::MetadataFetch(e)),
        };

        match outcome {
            Ok(entry) => {
                info!(pr = number, path = %entry.report_path.display(), "wrote PR report");
                entries.push(entry);
            }
            Err(e) => {
                warn!(pr = number, error = %e, "skipping PR");
                skipped.push((number, e));
            }
        }
    }
}

/// Fetch all records with bounded concurrency, returned in selection order.
async fn fetch_records(
    settings: &RunSettings,
    selection: &Selection,
    platform: &dyn ReviewPlatform,
) -> Vec<(u64, Result<PrRecord, PlatformError>)> {
    let semaphore = Arc::new(Semaphore::new(settings.concurrency));
    let fetches = selection.numbers.iter().map(|&number| {
        let semaphore = semaphore.clone();
        async move {
            // The semaphore is never closed
            let _permit = semaphore.acquire().await.ok();
            (number, collect_record(platform, number, settings.include_logs).await)
        }
    });
    futures::future::join_all(fetches).await
}

async fn process_record(
    settings: &RunSettings,
    vcs: &dyn VersionControl,
    record: PrRecord,
) -> Result<ProcessedEntry, PrProcessError> {
    // A fork branch named like the base must not clobber the local base.
    let branch = if record.head_branch == settings.base_branch {
        format!("pr-{}", record.number)
    } else {
        record.head_branch.clone()
    };

    let local_branch = vcs
        .checkout_pr_branch(&branch, &settings.remote, record.number)
        .await
        .map_err(PrProcessError::Checkout)?;

    let mut files = Vec::with_capacity(record.files.len());
    for file in &record.files {
        if vcs.file_exists(file).await {
            files.push(file.clone());
        }
    }
    if files.is_empty() {
        return Err(PrProcessError::NoExistingFiles(record.files.len()));
    }

    let report_path = report::write_pr_report(settings, vcs, &record, &local_branch, &files).await?;
    Ok(ProcessedEntry {
        record,
        local_branch,
        files,
        report_path,
    })
}

/// Write every aggregate artifact. A failure only costs that artifact.
async fn compile_artifacts(
    settings: &RunSettings,
    selection: &Selection,
    entries: &[ProcessedEntry],
    vcs: &dyn VersionControl,
    summary: &mut RunSummary,
) {
    let mut record = |name: &str, result: Result<PathBuf, ReportError>| match result {
        Ok(path) => {
            summary.artifacts.push(path.clone());
            Some(path)
        }
        Err(e) => {
            warn!(artifact = name, error = %e, "artifact not written");
            summary.artifact_errors.push(format!("{}: {}", name, e));
            None
        }
    };

    let master = record("master comparison", report::compile_master(settings, selection, entries));
    record("summaries", report::compile_summaries(settings, selection, entries));

    let append = if settings.append_master { master.as_deref() } else { None };
    record(
        "touched files",
        report::compile_touched_files(settings, selection, entries, vcs, append).await,
    );

    if !settings.round_robin {
        return;
    }
    match report::compile_round_robin(settings, selection, entries, vcs).await {
        Ok(output) => {
            summary.artifacts.extend(output.pair_paths);
            summary.artifacts.extend(output.index_path);
        }
        Err(e) => {
            warn!(error = %e, "round robin index not written");
            summary.artifact_errors.push(format!("round robin: {}", e));
        }
    }
}

/// Print the requested-versus-processed accounting to the terminal.
pub fn print_summary(summary: &RunSummary) {
    println!();
    if summary.interrupted {
        println!("{}", "Run interrupted; artifacts are incomplete.".yellow().bold());
    }
    println!(
        "Processed {} of {} requested PR(s)",
        summary.processed.len().to_string().bold(),
        summary.requested.len()
    );

    if summary.missing.is_empty() {
        println!("{}", "All requested PRs are included.".green());
    } else {
        println!(
            "{} {}",
            "Missing from aggregates:".red().bold(),
            report::join_numbers(&summary.missing)
        );
        for (number, reason) in &summary.skipped {
            println!("  #{}: {}", number, reason);
        }
    }

    if !summary.artifacts.is_empty() {
        println!();
        println!("Artifacts:");
        for path in &summary.artifacts {
            println!("  {}", path.display());
        }
    }
    for error in &summary.artifact_errors {
        println!("  {} {}", "failed:".red(), error);
    }
    println!();
}
