//! Core logic and abstractions for pagedeploy.
//!
//! This crate defines the build configuration, the bundle model, the
//! bundler and publisher seams, and the driver that sequences a deploy.

pub mod bundle;
pub mod config;
pub mod constants;
pub mod deploy;
pub mod format;
pub mod publish;

pub use bundle::command::CommandBundler;
pub use bundle::{Bundle, BundleError, Bundler, SourceBundler};
pub use config::{
    BundlerConfig, ConfigError, ConfigWarning, DeployConfig, LoadedConfig, OutputConfig,
    PublishConfig, PublishUser, TargetConfig,
};
pub use deploy::{DeployReport, Deployer};
pub use format::{FormatParseError, OutputFormat};
pub use publish::Publisher;
