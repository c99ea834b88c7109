use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::constants::{
    DEFAULT_BRANCH, DEFAULT_CACHE_DIR, DEFAULT_COMMIT_MESSAGE, DEFAULT_PUBLISH_DIR,
    DEFAULT_REMOTE,
};
use crate::format::OutputFormat;

#[derive(Debug, Clone, Deserialize)]
pub struct DeployConfig {
    /// Forces one output format across every output of every target.
    pub format_override: Option<OutputFormat>,
    pub bundler: Option<BundlerConfig>,
    pub targets: Vec<TargetConfig>,
    #[serde(default)]
    pub publish: PublishConfig,
}

/// A configuration file together with the non-fatal warnings found while parsing it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: DeployConfig,
    pub warnings: Vec<ConfigWarning>,
}

/// A key present in the file that pagedeploy does not understand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub file: PathBuf,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown key '{}' in {}", self.key, self.file.display())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration declares no build targets")]
    NoTargets,
    #[error("target '{0}' declares no inputs")]
    NoInputs(String),
    #[error("target '{0}' declares no outputs")]
    NoOutputs(String),
}

impl DeployConfig {
    /// Reads and validates the configuration at `path`.
    ///
    /// When `format_override` is given it wins over any override declared in the file.
    pub async fn load_from_file(
        path: impl AsRef<Path>,
        format_override: Option<OutputFormat>,
    ) -> Result<LoadedConfig> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&text, path, format_override)
    }

    /// Parses configuration text; `source` is only used to label warnings and errors.
    pub fn from_toml_str(
        text: &str,
        source: &Path,
        format_override: Option<OutputFormat>,
    ) -> Result<LoadedConfig> {
        let mut unknown_paths = Vec::new();
        let deserializer = toml::de::Deserializer::new(text);
        let mut config: Self = serde_ignored::deserialize(deserializer, |p| {
            unknown_paths.push(p.to_string());
        })
        .with_context(|| format!("failed to parse TOML config: {}", source.display()))?;

        config.validate()?;

        if let Some(format) = format_override.or(config.format_override) {
            config.apply_format_override(format);
        }

        let warnings = unknown_paths
            .into_iter()
            .map(|key| ConfigWarning {
                key,
                file: source.to_path_buf(),
            })
            .collect::<Vec<_>>();

        debug!(
            "loaded {} targets from {} ({} warnings)",
            config.targets.len(),
            source.display(),
            warnings.len()
        );

        Ok(LoadedConfig { config, warnings })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        for target in &self.targets {
            if target.inputs.is_empty() {
                return Err(ConfigError::NoInputs(target.label()));
            }
            if target.output.is_empty() {
                return Err(ConfigError::NoOutputs(target.label()));
            }
        }
        Ok(())
    }

    /// Rewrites every output descriptor to use `format`.
    pub fn apply_format_override(&mut self, format: OutputFormat) {
        self.format_override = Some(format);
        for output in self.targets.iter_mut().flat_map(|t| t.output.iter_mut()) {
            output.format = format;
        }
    }
}

/// One build target: the inputs bundled together and every place the result is written.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Global name exposed by `umd` and `iife` outputs.
    pub name: Option<String>,
    pub inputs: Vec<PathBuf>,
    pub output: Vec<OutputConfig>,
}

impl TargetConfig {
    pub fn label(&self) -> String {
        match (&self.name, self.inputs.first()) {
            (Some(name), _) => name.clone(),
            (None, Some(input)) => input.display().to_string(),
            (None, None) => "<unnamed>".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: PathBuf,
    pub banner: Option<String>,
    pub footer: Option<String>,
}

/// An external program that produces the bundle code on stdout.
#[derive(Debug, Clone, Deserialize)]
pub struct BundlerConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_publish_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Repository URL; defaults to the URL of `remote` in the working directory.
    pub repo: Option<String>,
    #[serde(default = "default_message")]
    pub message: String,
    /// Publish files whose name starts with a dot.
    #[serde(default)]
    pub dotfiles: bool,
    /// Keep files already on the branch instead of replacing them.
    #[serde(default)]
    pub add: bool,
    #[serde(default = "default_push")]
    pub push: bool,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    pub user: Option<PublishUser>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            dir: default_publish_dir(),
            branch: default_branch(),
            remote: default_remote(),
            repo: None,
            message: default_message(),
            dotfiles: false,
            add: false,
            push: default_push(),
            cache_dir: default_cache_dir(),
            user: None,
        }
    }
}

/// Commit identity used on the pages branch.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishUser {
    pub name: String,
    pub email: String,
}

fn default_publish_dir() -> PathBuf {
    PathBuf::from(DEFAULT_PUBLISH_DIR)
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_remote() -> String {
    DEFAULT_REMOTE.to_string()
}

fn default_message() -> String {
    DEFAULT_COMMIT_MESSAGE.to_string()
}

fn default_push() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}
