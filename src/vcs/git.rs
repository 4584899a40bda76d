use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{validate_ref_name, VcsError, VersionControl};

/// `VersionControl` implemented by shelling out to the `git` binary.
///
/// Every argument is passed separately, never through a shell.
pub struct GitCli {
    root: PathBuf,
}

struct GitOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn git(&self, args: &[&str]) -> Result<GitOutput, VcsError> {
        debug!(args = ?args, "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .await?;

        Ok(GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    async fn ref_exists(&self, reference: &str) -> Result<bool, VcsError> {
        Ok(self
            .git(&["rev-parse", "--verify", "--quiet", reference])
            .await?
            .success)
    }

    /// Check out an existing local `branch` without moving it, or create it
    /// from `remote/branch`. `None` when neither exists or checkout fails.
    async fn checkout_named_branch(
        &self,
        branch: &str,
        remote: &str,
    ) -> Result<Option<String>, VcsError> {
        let checkout = if self.ref_exists(&format!("refs/heads/{}", branch)).await? {
            self.git(&["checkout", branch]).await?
        } else if self
            .ref_exists(&format!("refs/remotes/{}/{}", remote, branch))
            .await?
        {
            let start_point = format!("{}/{}", remote, branch);
            self.git(&["checkout", "-b", branch, &start_point]).await?
        } else {
            return Ok(None);
        };

        if checkout.success {
            debug!(local = branch, "checked out PR branch");
            Ok(Some(branch.to_string()))
        } else {
            debug!(stderr = %checkout.stderr, "branch checkout failed, trying pull ref");
            Ok(None)
        }
    }

    /// `git diff` over `revs`, restricted to `paths`. Color and external diff
    /// drivers are always off so the text parses the same on every machine.
    async fn diff_paths(&self, revs: &[&str], paths: &[String]) -> Result<String, VcsError> {
        if paths.is_empty() {
            return Ok(String::new());
        }

        let mut args: Vec<&str> = vec!["diff", "--no-color", "--no-ext-diff"];
        args.extend_from_slice(revs);
        args.push("--");
        args.extend(paths.iter().map(String::as_str));
        self.git_ok(&args).await
    }

    /// Run git and turn a non-zero exit into `VcsError::Command`.
    async fn git_ok(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = self.git(args).await?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(VcsError::Command {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: output.stderr,
            })
        }
    }
}

#[async_trait]
impl VersionControl for GitCli {
    #[instrument(skip(self))]
    async fn fetch_remote(&self, remote: &str) -> Result<(), VcsError> {
        validate_ref_name(remote)?;
        self.git_ok(&["fetch", remote]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn checkout_pr_branch(
        &self,
        branch: &str,
        remote: &str,
        number: u64,
    ) -> Result<String, VcsError> {
        validate_ref_name(remote)?;

        match validate_ref_name(branch) {
            Ok(()) => {
                if let Some(local) = self.checkout_named_branch(branch, remote).await? {
                    return Ok(local);
                }
            }
            Err(_) => debug!(branch, "head branch is not a usable ref name, using pull ref"),
        }

        let local = format!("pr-{}", number);
        let refspec = format!("+pull/{}/head:{}", number, local);
        let fetch = self
            .git(&["fetch", "--update-head-ok", remote, &refspec])
            .await?;
        if !fetch.success {
            return Err(VcsError::Checkout {
                number,
                reason: fetch.stderr,
            });
        }

        let checkout = self.git(&["checkout", &local]).await?;
        if !checkout.success {
            return Err(VcsError::Checkout {
                number,
                reason: checkout.stderr,
            });
        }
        debug!(local = %local, "checked out pull ref");
        Ok(local)
    }

    async fn diff(&self, from: &str, to: &str, paths: &[String]) -> Result<String, VcsError> {
        validate_ref_name(from)?;
        validate_ref_name(to)?;
        self.diff_paths(&[from, to], paths).await
    }

    async fn diff_from_merge_base(
        &self,
        base: &str,
        head: &str,
        paths: &[String],
    ) -> Result<String, VcsError> {
        validate_ref_name(base)?;
        validate_ref_name(head)?;
        let range = format!("{}...{}", base, head);
        self.diff_paths(&[range.as_str()], paths).await
    }

    async fn show_file_at(&self, reference: &str, path: &str) -> Result<String, VcsError> {
        validate_ref_name(reference)?;
        let spec = format!("{}:{}", reference, path);
        let output = self.git(&["show", &spec]).await?;
        if output.success {
            return Ok(output.stdout);
        }

        if output.stderr.contains("does not exist") || output.stderr.contains("but not in") {
            Err(VcsError::MissingAtRef {
                reference: reference.to_string(),
                path: path.to_string(),
            })
        } else {
            Err(VcsError::Command {
                command: "show".to_string(),
                stderr: output.stderr,
            })
        }
    }

    async fn current_branch(&self) -> Result<String, VcsError> {
        let name = self.git_ok(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        Ok(name.trim().to_string())
    }

    #[instrument(skip(self))]
    async fn checkout(&self, branch: &str) -> Result<(), VcsError> {
        validate_ref_name(branch)?;
        self.git_ok(&["checkout", branch]).await?;
        Ok(())
    }

    async fn file_exists(&self, path: &str) -> bool {
        tokio::fs::try_exists(self.root.join(path))
            .await
            .unwrap_or(false)
    }

    async fn remote_url(&self, remote: &str) -> Result<String, VcsError> {
        validate_ref_name(remote)?;
        let url = self.git_ok(&["remote", "get-url", remote]).await?;
        Ok(url.trim().to_string())
    }
}
