use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use pagedeploy_core::constants::COMPLETION_MESSAGE;
use pagedeploy_core::{
    Bundler, CommandBundler, DeployConfig, DeployReport, Deployer, OutputFormat, SourceBundler,
};
use pagedeploy_gh::GhPages;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod init;
mod styles;

use styles as s;

/// The command-line interface for pagedeploy.
#[derive(Debug, Parser)]
#[command(name = "pdeploy")]
#[command(version)]
#[command(styles = s::get_clap_styles())]
#[command(about = "Bundle a web application and publish it to a pages branch")]
#[command(
    long_about = "pdeploy reads deploy.toml, builds every target in declared order, writes
each target's outputs, then pushes the publish directory to the pages branch.

Commands:
  deploy            Build all targets and publish (default)
  init              Write a starter deploy.toml in the current directory
"
)]
#[command(
    after_help = "\x1b[1;32mExamples:\x1b[0m\n  \x1b[36mpdeploy\x1b[0m                       \x1b[2m# Build and publish\x1b[0m\n  \x1b[36mpdeploy --format es\x1b[0m           \x1b[2m# Force ES module output for every target\x1b[0m\n  \x1b[36mpdeploy --skip-publish\x1b[0m        \x1b[2m# Build only\x1b[0m\n  \x1b[36mpdeploy init esbuild\x1b[0m          \x1b[2m# Bootstrap a config that shells out to esbuild\x1b[0m"
)]
pub(crate) struct Cli {
    /// What to do.
    #[arg(value_enum, default_value_t = Action::Deploy)]
    command: Action,
    /// Template for `init` (source or esbuild).
    template: Option<String>,
    /// Path to the deploy config file.
    #[arg(long, default_value = pagedeploy_core::constants::CONFIG_FILE)]
    config: PathBuf,
    /// Force one output format across all targets.
    #[arg(long)]
    format: Option<OutputFormat>,
    /// Write outputs but do not push anything.
    #[arg(long, default_value_t = false)]
    skip_publish: bool,
    /// Overwrite generated files if they already exist.
    #[arg(long, default_value_t = false)]
    force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    Deploy,
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    debug!("parsed cli arguments: {:?}", cli);

    match cli.command {
        Action::Init => init::run(&cli).await,
        Action::Deploy => {
            let report = deploy(&cli).await?;
            println!("{}", summary_line(&report));
            Ok(())
        }
    }
}

/// The single line printed to stdout once a deploy finishes.
fn summary_line(report: &DeployReport) -> String {
    if report.published {
        COMPLETION_MESSAGE.to_string()
    } else {
        format!(
            "built {} targets, wrote {} files",
            report.targets_built,
            report.written.len()
        )
    }
}

/// Loads the config named on the command line and runs the full deploy.
async fn deploy(cli: &Cli) -> Result<DeployReport> {
    let loaded = DeployConfig::load_from_file(&cli.config, cli.format)
        .await
        .with_context(|| format!("unable to load config '{}'", cli.config.display()))?;

    let bundler: Box<dyn Bundler> = match &loaded.config.bundler {
        Some(bundler) => Box::new(CommandBundler::new(bundler.clone())),
        None => Box::new(SourceBundler),
    };
    let base_dir = std::env::current_dir().context("failed to resolve working directory")?;
    let publisher = Box::new(GhPages::new(base_dir));

    Deployer::new(bundler, publisher)
        .skip_publish(cli.skip_publish)
        .run(&loaded)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn test_cli(config: PathBuf) -> Cli {
        Cli {
            command: Action::Deploy,
            template: None,
            config,
            format: None,
            skip_publish: true,
            force: false,
        }
    }

    fn write_project(root: &std::path::Path) -> PathBuf {
        fs::write(root.join("a.ts"), "export const a = 1;\n").unwrap();
        fs::write(root.join("b.ts"), "export const b = 2;\n").unwrap();
        let config = root.join("deploy.toml");
        fs::write(
            &config,
            format!(
                r#"
[[targets]]
name = "A"
inputs = ["{root}/a.ts"]

[[targets.output]]
format = "umd"
file = "{root}/dist/a.umd.js"

[[targets]]
name = "B"
inputs = ["{root}/b.ts"]

[[targets.output]]
format = "es"
file = "{root}/dist/b.es.js"
"#,
                root = root.display()
            ),
        )
        .unwrap();
        config
    }

    #[test]
    fn parses_default_invocation() {
        let cli = Cli::try_parse_from(["pdeploy"]).expect("no arguments required");
        assert_eq!(cli.command, Action::Deploy);
        assert_eq!(cli.config, PathBuf::from("deploy.toml"));
        assert!(cli.format.is_none());
    }

    #[test]
    fn parses_format_override() {
        let cli = Cli::try_parse_from(["pdeploy", "--format", "cjs"]).unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Cjs));
        assert!(Cli::try_parse_from(["pdeploy", "--format", "system"]).is_err());
    }

    #[test]
    fn published_run_prints_completion_once() {
        let report = DeployReport {
            targets_built: 2,
            written: vec![PathBuf::from("dist/a.js")],
            warnings: 0,
            published: true,
        };
        assert_eq!(summary_line(&report), "Deploy Complete!");

        let built_only = DeployReport {
            published: false,
            ..report
        };
        let line = summary_line(&built_only);
        assert_eq!(line, "built 2 targets, wrote 1 files");
        assert!(!line.contains(COMPLETION_MESSAGE));
    }

    #[tokio::test]
    async fn integration_test_deploy_without_publish() {
        let dir = tempdir().unwrap();
        let cli = test_cli(write_project(dir.path()));

        let report = deploy(&cli).await.expect("deploy should pass");
        assert_eq!(report.targets_built, 2);
        assert!(!report.published);
        let umd = fs::read_to_string(dir.path().join("dist/a.umd.js")).unwrap();
        assert!(umd.contains("global.A = factory()"));
        let es = fs::read_to_string(dir.path().join("dist/b.es.js")).unwrap();
        assert_eq!(es, "export const b = 2;\n");
    }

    #[tokio::test]
    async fn format_flag_overrides_config() {
        let dir = tempdir().unwrap();
        let mut cli = test_cli(write_project(dir.path()));
        cli.format = Some(OutputFormat::Cjs);

        deploy(&cli).await.expect("deploy should pass");
        let out = fs::read_to_string(dir.path().join("dist/b.es.js")).unwrap();
        assert!(out.starts_with("'use strict';"));
    }

    #[tokio::test]
    async fn missing_config_fails() {
        let dir = tempdir().unwrap();
        let cli = test_cli(dir.path().join("deploy.toml"));
        let err = deploy(&cli).await.expect_err("must fail");
        assert!(err.to_string().contains("unable to load config"));
    }
}
