use std::{fs, path::Path};

use anyhow::{anyhow, Context, Result};

use crate::Cli;
use tracing::{info, instrument};

/// Runs the `init` command to write a starter deploy config.
#[instrument(skip(cli))]
pub async fn run(cli: &Cli) -> Result<()> {
    let template = match cli.template.as_deref() {
        Some(value) => InitTemplate::from_str(value)?,
        None => InitTemplate::Source,
    };

    write_if_absent(&cli.config, template.render_config(), cli.force)
        .with_context(|| format!("failed to write '{}'", cli.config.display()))?;

    // Fail early if the template itself does not load.
    pagedeploy_core::DeployConfig::load_from_file(&cli.config, None).await?;

    info!(
        "init complete: template={}, config={}",
        template.as_str(),
        cli.config.display()
    );
    println!("next: run 'pdeploy --skip-publish' to check the build");

    Ok(())
}

/// Supported starter configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitTemplate {
    /// Concatenates sources with the built-in bundler.
    Source,
    /// Delegates bundling to esbuild.
    Esbuild,
}

impl InitTemplate {
    fn from_str(value: &str) -> Result<Self> {
        match value {
            "source" => Ok(Self::Source),
            "esbuild" => Ok(Self::Esbuild),
            other => Err(anyhow!(
                "unknown init template '{}' (supported: source,esbuild)",
                other
            )),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Esbuild => "esbuild",
        }
    }

    fn render_config(self) -> &'static str {
        match self {
            Self::Source => {
                r#"[[targets]]
name = "app"
inputs = ["src/main.js"]

[[targets.output]]
format = "iife"
file = "public/build/bundle.js"

[publish]
dir = "public"
branch = "gh-pages"
"#
            }
            Self::Esbuild => {
                r#"[bundler]
program = "esbuild"
args = ["{input}", "--bundle", "--format=esm"]

[[targets]]
name = "app"
inputs = ["src/main.ts"]

[[targets.output]]
format = "es"
file = "public/build/bundle.js"

[publish]
dir = "public"
branch = "gh-pages"
message = "Deploy"
"#
            }
        }
    }
}

fn write_if_absent(output: &Path, content: &str, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(anyhow!(
            "'{}' already exists. Re-run with --force to overwrite",
            output.display()
        ));
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }

    fs::write(output, content)
        .with_context(|| format!("failed to write file '{}'", output.display()))
}
