use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::PublishError;

/// Runs `git` subcommands inside one working directory.
#[derive(Debug, Clone)]
pub struct Git {
    cwd: PathBuf,
}

impl Git {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Runs `git <args>` and returns trimmed stdout, failing on a non-zero exit.
    pub async fn exec(&self, args: &[&str]) -> Result<String, PublishError> {
        debug!("git {} (in {})", args.join(" "), self.cwd.display());
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| PublishError::Spawn {
                args: args.join(" "),
                source,
            })?;

        if !output.status.success() {
            return Err(PublishError::Git {
                args: args.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Runs `git <args>` and reports only whether it exited successfully.
    pub async fn succeeds(&self, args: &[&str]) -> Result<bool, PublishError> {
        match self.exec(args).await {
            Ok(_) => Ok(true),
            Err(PublishError::Git { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// URL configured for `remote`.
    pub async fn remote_url(&self, remote: &str) -> Result<String, PublishError> {
        let key = format!("remote.{remote}.url");
        match self.exec(&["config", "--get", &key]).await {
            Ok(url) if !url.is_empty() => Ok(url),
            Ok(_) | Err(PublishError::Git { .. }) => {
                Err(PublishError::MissingRemote(remote.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Clones `repo` into `dir`, preferring a single-branch clone of `branch`.
    ///
    /// `dir` must be absolute; its parent has to exist.
    pub async fn clone_repo(
        repo: &str,
        dir: &Path,
        branch: &str,
        remote: &str,
    ) -> Result<Self, PublishError> {
        let parent = dir.parent().unwrap_or_else(|| Path::new("."));
        let dest = dir.to_string_lossy().into_owned();
        let outer = Git::new(parent);
        let single = outer
            .exec(&[
                "clone",
                repo,
                &dest,
                "--branch",
                branch,
                "--single-branch",
                "--origin",
                remote,
                "--depth",
                "1",
            ])
            .await;
        if single.is_err() {
            debug!("branch {branch} not cloneable, falling back to a full clone");
            outer.exec(&["clone", repo, &dest, "--origin", remote]).await?;
        }
        Ok(Git::new(dir))
    }

    /// Checks out `branch`, tracking the remote branch when it exists and starting an
    /// orphan branch otherwise.
    pub async fn checkout(&self, remote: &str, branch: &str) -> Result<(), PublishError> {
        let remote_ref = format!("refs/remotes/{remote}/{branch}");
        let exists = self
            .succeeds(&["ls-remote", "--exit-code", ".", &remote_ref])
            .await?;
        if exists {
            self.exec(&["checkout", branch]).await?;
            let tracking = format!("{remote}/{branch}");
            self.exec(&["reset", "--hard", &tracking]).await?;
        } else {
            self.exec(&["checkout", "--orphan", branch]).await?;
        }
        Ok(())
    }
}
