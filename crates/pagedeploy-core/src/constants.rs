//! Constants used across the pagedeploy workspace.

/// The filename pagedeploy reads its build configuration from.
pub const CONFIG_FILE: &str = "deploy.toml";

/// Directory pushed to the pages branch when none is configured.
pub const DEFAULT_PUBLISH_DIR: &str = "public";

/// Branch the publish step commits to.
pub const DEFAULT_BRANCH: &str = "gh-pages";
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Updates";

/// Where cached clones of the pages repository live between runs.
pub const DEFAULT_CACHE_DIR: &str = ".cache/pagedeploy";

/// Printed once the publish step has finished.
pub const COMPLETION_MESSAGE: &str = "Deploy Complete!";

/// Placeholders expanded in external bundler arguments.
pub const INPUT_PLACEHOLDER: &str = "{input}";
pub const NAME_PLACEHOLDER: &str = "{name}";
