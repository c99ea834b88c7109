//! Publishes a local directory to a pages branch by driving `git`.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use pagedeploy_core::{PublishConfig, Publisher};

pub mod git;

pub use git::Git;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish directory '{}' does not exist", .0.display())]
    MissingSource(PathBuf),
    #[error("git remote '{0}' has no url; set publish.repo")]
    MissingRemote(String),
    #[error("failed to start 'git {args}'")]
    Spawn {
        args: String,
        #[source]
        source: io::Error,
    },
    #[error("'git {args}' failed with {status}: {stderr}")]
    Git {
        args: String,
        status: String,
        stderr: String,
    },
    #[error("failed to copy '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Commits the publish directory to a branch of a cached clone and pushes it.
#[derive(Debug, Clone)]
pub struct GhPages {
    base_dir: PathBuf,
}

impl GhPages {
    /// `base_dir` is the project root that relative publish paths are resolved against.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    async fn resolve_repo(&self, config: &PublishConfig) -> Result<String, PublishError> {
        match &config.repo {
            Some(repo) => Ok(repo.clone()),
            None => Git::new(&self.base_dir).remote_url(&config.remote).await,
        }
    }

    /// Returns a clean clone of `repo` on `config.branch`, reusing the cached one when possible.
    async fn prepare_clone(&self, repo: &str, config: &PublishConfig) -> Result<Git, PublishError> {
        let cache_root = self.base_dir.join(&config.cache_dir);
        tokio::fs::create_dir_all(&cache_root)
            .await
            .map_err(|source| PublishError::Io {
                path: cache_root.clone(),
                source,
            })?;
        let cache_root = tokio::fs::canonicalize(&cache_root)
            .await
            .map_err(|source| PublishError::Io {
                path: cache_root.clone(),
                source,
            })?;
        let clone_dir = cache_root.join(cache_key(repo));

        let reusable = if clone_dir.join(".git").is_dir() {
            let cached = Git::new(&clone_dir);
            matches!(cached.remote_url(&config.remote).await, Ok(url) if url == repo)
        } else {
            false
        };

        let git = if reusable {
            debug!("reusing clone at {}", clone_dir.display());
            Git::new(&clone_dir)
        } else {
            if clone_dir.exists() {
                tokio::fs::remove_dir_all(&clone_dir)
                    .await
                    .map_err(|source| PublishError::Io {
                        path: clone_dir.clone(),
                        source,
                    })?;
            }
            info!(target: "pagedeploy", "cloning {} into {}", repo, clone_dir.display());
            Git::clone_repo(repo, &clone_dir, &config.branch, &config.remote).await?
        };

        git.exec(&["clean", "-f", "-d"]).await?;
        git.exec(&["fetch", &config.remote]).await?;
        git.checkout(&config.remote, &config.branch).await?;
        Ok(git)
    }
}

#[async_trait]
impl Publisher for GhPages {
    fn name(&self) -> &str {
        "gh-pages"
    }

    #[instrument(skip(self, config), fields(branch = %config.branch))]
    async fn publish(&self, config: &PublishConfig) -> Result<()> {
        let source = self.base_dir.join(&config.dir);
        if !source.is_dir() {
            return Err(PublishError::MissingSource(source).into());
        }

        let repo = self.resolve_repo(config).await?;
        let git = self.prepare_clone(&repo, config).await?;

        if !config.add {
            git.exec(&["rm", "--ignore-unmatch", "-r", "-f", "-q", "."]).await?;
        }

        let dest = git.cwd().to_path_buf();
        let dotfiles = config.dotfiles;
        let copied = tokio::task::spawn_blocking(move || copy_tree(&source, &dest, dotfiles))
            .await??;
        debug!("copied {} files", copied);

        if let Some(user) = &config.user {
            git.exec(&["config", "user.name", &user.name]).await?;
            git.exec(&["config", "user.email", &user.email]).await?;
        }

        git.exec(&["add", "--all", "."]).await?;
        let unchanged = git.succeeds(&["diff-index", "--quiet", "HEAD"]).await?;
        if unchanged {
            info!(target: "pagedeploy", "no changes to commit on {}", config.branch);
        } else {
            git.exec(&["commit", "-m", &config.message]).await?;
        }

        if config.push {
            info!(target: "pagedeploy", "pushing {} to {}", config.branch, config.remote);
            git.exec(&["push", "--tags", &config.remote, &config.branch]).await?;
        }

        Ok(())
    }
}

/// Directory name for the cached clone of `repo`.
fn cache_key(repo: &str) -> String {
    repo.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '!'
            }
        })
        .collect()
}

/// Copies every file under `source` into `dest`; returns the number of files copied.
fn copy_tree(source: &Path, dest: &Path, dotfiles: bool) -> Result<usize, PublishError> {
    let mut copied = 0;
    let walker = WalkDir::new(source)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| dotfiles || !is_hidden(entry.file_name()));

    for entry in walker {
        let entry = entry.map_err(|e| PublishError::Io {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| source.to_path_buf()),
            source: e.into(),
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .unwrap_or_else(|_| entry.path());
        if relative.starts_with(".git") {
            continue;
        }

        let target = dest.join(relative);
        let io_err = |source| PublishError::Io {
            path: entry.path().to_path_buf(),
            source,
        };
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(io_err)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
            std::fs::copy(entry.path(), &target).map_err(io_err)?;
            copied += 1;
        }
    }

    Ok(copied)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}
