mod config;
mod platform;
mod report;
mod run;
mod selection;
#[cfg(test)]
mod testing;
mod vcs;

use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

/// PR Compiler builds review artifacts for a set of GitHub Pull Requests:
/// per-PR diffs, a master comparison, summaries, the touched files as they
/// exist on the base branch, and pairwise diffs between every two PRs.
#[derive(Parser, Debug)]
#[command(name = "pr-compiler", version, about)]
struct Cli {
    /// PR selection, e.g. "12-18,21,#30-#32"
    selection: String,

    /// Directory artifacts are written into
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Base branch diffs and touched files are taken from (default: main)
    #[arg(long)]
    base: Option<String>,

    /// Git remote PR branches are fetched from (default: origin)
    #[arg(long)]
    remote: Option<String>,

    /// GitHub repository as OWNER/REPO; derived from the remote URL if omitted
    #[arg(long)]
    repo: Option<String>,

    /// Fetch log output for failing CI checks
    #[arg(long)]
    include_logs: bool,

    /// Append the master comparison to the touched-files compilation
    #[arg(long)]
    append_master: bool,

    /// Skip the pairwise comparisons
    #[arg(long)]
    no_round_robin: bool,

    /// Leave the last PR branch checked out instead of returning to the base
    #[arg(long)]
    no_cleanup: bool,

    /// Maximum number of PRs fetched from GitHub at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print the canonical selection and its tag, then exit
    #[arg(long)]
    selection_only: bool,

    /// Config file (default: .pr-compiler.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let selection = selection::parse(&cli.selection)?;
    let tag = selection.tag();
    let _main_span = info_span!("pr_compile", selection = %selection.canonical, tag = %tag).entered();
    info!(count = selection.len(), "parsed selection");

    if cli.selection_only {
        println!("Requested: {}", selection.requested);
        println!("Canonical: {}", selection.canonical);
        println!("Tag: {}", tag);
        println!("Count: {}", selection.len());
        return Ok(());
    }

    info!("loading configuration");
    let config = config::Config::load(cli.config.as_deref())?;
    let settings = config::RunSettings::resolve(
        config,
        config::Overrides {
            output_dir: cli.output_dir,
            base_branch: cli.base,
            remote: cli.remote,
            repository: cli.repo,
            concurrency: cli.concurrency,
            include_logs: cli.include_logs,
            append_master: cli.append_master,
            no_round_robin: cli.no_round_robin,
            no_cleanup: cli.no_cleanup,
        },
    );
    debug!(remote = %settings.remote, base = %settings.base_branch, output = %settings.output_dir.display(), "resolved settings");

    let git = vcs::GitCli::new(std::env::current_dir()?);
    let slug = run::resolve_repository(&settings, &git).await?;
    info!(repository = %slug, "using repository");
    let github = platform::GitHubPlatform::new(slug, settings.api_url.as_deref(), settings.token.clone());

    let summary = run::run(&settings, &selection, &github, &git).await;
    run::print_summary(&summary);
    info!(processed = summary.processed.len(), requested = summary.requested.len(), "done");

    if summary.interrupted {
        return Err("run interrupted".into());
    }
    if summary.processed.is_empty() {
        return Err("none of the requested PRs could be processed".into());
    }
    Ok(())
}
