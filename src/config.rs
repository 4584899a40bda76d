use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = ".pr-compiler.toml";
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_BASE_BRANCH: &str = "main";
pub const DEFAULT_CONCURRENCY: usize = 4;
/// Selections larger than this are previewed instead of listed in headers.
pub const DEFAULT_PREVIEW_THRESHOLD: usize = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration loaded from .pr-compiler.toml.
/// All fields are optional; the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    /// `owner/repo`; derived from the remote URL when unset
    pub repository: Option<String>,
    /// API root for GitHub Enterprise installs
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitConfig {
    pub remote: Option<String>,
    pub base_branch: Option<String>,
    /// Check the base branch back out when the run ends (default true)
    pub cleanup: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    pub dir: Option<PathBuf>,
    pub include_logs: Option<bool>,
    pub append_master: Option<bool>,
    pub round_robin: Option<bool>,
    pub preview_threshold: Option<usize>,
    pub concurrency: Option<usize>,
}

impl Config {
    /// Load configuration from `path`, or from .pr-compiler.toml in the
    /// current directory when no path is given. A missing default file
    /// yields the default config; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from(default_path)?
                } else {
                    Config::default()
                }
            }
        };

        if config.github.token.is_none() {
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                config.github.token = Some(token);
            }
        }

        Ok(config)
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output_dir: Option<PathBuf>,
    pub base_branch: Option<String>,
    pub remote: Option<String>,
    pub repository: Option<String>,
    pub concurrency: Option<usize>,
    pub include_logs: bool,
    pub append_master: bool,
    pub no_round_robin: bool,
    pub no_cleanup: bool,
}

/// Fully resolved settings for one run. Built once in `main` and passed by
/// reference to every component.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub remote: String,
    pub base_branch: String,
    pub output_dir: PathBuf,
    pub repository: Option<String>,
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub include_logs: bool,
    pub append_master: bool,
    pub round_robin: bool,
    /// Restore the base branch after processing
    pub cleanup: bool,
    pub preview_threshold: usize,
    pub concurrency: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::resolve(Config::default(), Overrides::default())
    }
}

impl RunSettings {
    pub fn resolve(config: Config, overrides: Overrides) -> Self {
        let Config { github, git, output } = config;

        Self {
            remote: overrides
                .remote
                .or(git.remote)
                .unwrap_or_else(|| DEFAULT_REMOTE.to_string()),
            base_branch: overrides
                .base_branch
                .or(git.base_branch)
                .unwrap_or_else(|| DEFAULT_BASE_BRANCH.to_string()),
            output_dir: overrides
                .output_dir
                .or(output.dir)
                .unwrap_or_else(|| PathBuf::from(".")),
            repository: overrides.repository.or(github.repository),
            api_url: github.api_url,
            token: github.token,
            include_logs: overrides.include_logs || output.include_logs.unwrap_or(false),
            append_master: overrides.append_master || output.append_master.unwrap_or(false),
            round_robin: !overrides.no_round_robin && output.round_robin.unwrap_or(true),
            cleanup: !overrides.no_cleanup && git.cleanup.unwrap_or(true),
            preview_threshold: output.preview_threshold.unwrap_or(DEFAULT_PREVIEW_THRESHOLD),
            concurrency: overrides
                .concurrency
                .or(output.concurrency)
                .unwrap_or(DEFAULT_CONCURRENCY)
                .max(1),
        }
    }
}
