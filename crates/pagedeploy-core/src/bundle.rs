//! In-memory bundles and the seam through which they are produced.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::{OutputConfig, TargetConfig};
use crate::format::OutputFormat;

pub mod command;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("output format '{format}' requires a name for target '{target}'")]
    MissingName { format: OutputFormat, target: String },
    #[error("bundler '{program}' exited with {status} for target '{target}': {stderr}")]
    BundlerFailed {
        program: String,
        status: String,
        target: String,
        stderr: String,
    },
}

/// The code produced for one target, before it is wrapped for a specific output format.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub target: String,
    pub name: Option<String>,
    pub code: String,
    /// Non-fatal diagnostics emitted while building.
    pub warnings: Vec<String>,
}

impl Bundle {
    pub fn new(target: &TargetConfig, code: String) -> Self {
        Self {
            target: target.label(),
            name: target.name.clone(),
            code,
            warnings: Vec::new(),
        }
    }

    /// Renders the bundle as it should appear on disk for `output`.
    pub fn render(&self, output: &OutputConfig) -> Result<String, BundleError> {
        let body = self.code.trim_end();
        let wrapped = match output.format {
            OutputFormat::Es => format!("{body}\n"),
            OutputFormat::Cjs => format!("'use strict';\n\n{body}\n"),
            OutputFormat::Amd => {
                format!("define((function () {{ 'use strict';\n\n{body}\n\n}}));\n")
            }
            OutputFormat::Iife => match &self.name {
                Some(name) => format!(
                    "var {name} = (function () {{\n'use strict';\n\n{body}\n\n}})();\n"
                ),
                None => format!("(function () {{\n'use strict';\n\n{body}\n\n}})();\n"),
            },
            OutputFormat::Umd => {
                let name = self.name.as_deref().ok_or_else(|| BundleError::MissingName {
                    format: output.format,
                    target: self.target.clone(),
                })?;
                format!(
                    "(function (global, factory) {{\n\
                     \ttypeof exports === 'object' && typeof module !== 'undefined' ? module.exports = factory() :\n\
                     \ttypeof define === 'function' && define.amd ? define(factory) :\n\
                     \t(global = typeof globalThis !== 'undefined' ? globalThis : global || self, global.{name} = factory());\n\
                     }})(this, (function () {{ 'use strict';\n\n{body}\n\n}}));\n"
                )
            }
        };

        let mut rendered = String::new();
        if let Some(banner) = &output.banner {
            rendered.push_str(banner);
            rendered.push('\n');
        }
        rendered.push_str(&wrapped);
        if let Some(footer) = &output.footer {
            rendered.push_str(footer);
            rendered.push('\n');
        }
        Ok(rendered)
    }

    /// Renders and writes the bundle to `output.file`, creating parent directories.
    #[instrument(skip(self, output), fields(file = %output.file.display()))]
    pub async fn write(&self, output: &OutputConfig) -> Result<PathBuf> {
        let rendered = self.render(output)?;
        if let Some(parent) = output.file.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
        }
        tokio::fs::write(&output.file, rendered.as_bytes())
            .await
            .with_context(|| format!("failed to write '{}'", output.file.display()))?;
        debug!("wrote {} bytes as {}", rendered.len(), output.format);
        Ok(output.file.clone())
    }
}

/// A contract for anything able to turn a build target into a [`Bundle`].
#[async_trait]
pub trait Bundler: std::fmt::Debug + Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn build(&self, target: &TargetConfig) -> Result<Bundle>;
}

/// Built-in bundler that concatenates a target's inputs in declared order.
#[derive(Debug, Default)]
pub struct SourceBundler;

#[async_trait]
impl Bundler for SourceBundler {
    fn name(&self) -> &str {
        "source"
    }

    #[instrument(skip(self, target), fields(target = %target.label()))]
    async fn build(&self, target: &TargetConfig) -> Result<Bundle> {
        let mut code = String::new();
        for input in &target.inputs {
            let text = tokio::fs::read_to_string(input)
                .await
                .with_context(|| format!("failed to read input '{}'", input.display()))?;
            if !code.is_empty() && !code.ends_with('\n') {
                code.push('\n');
            }
            code.push_str(&text);
        }

        let mut bundle = Bundle::new(target, code);
        if bundle.code.trim().is_empty() {
            bundle
                .warnings
                .push(format!("target '{}' generated an empty bundle", bundle.target));
        }
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: Option<&str>, inputs: Vec<PathBuf>) -> TargetConfig {
        TargetConfig {
            name: name.map(ToOwned::to_owned),
            inputs,
            output: Vec::new(),
        }
    }

    fn output(format: OutputFormat, file: PathBuf) -> OutputConfig {
        OutputConfig {
            format,
            file,
            banner: None,
            footer: None,
        }
    }

    fn bundle(name: Option<&str>) -> Bundle {
        Bundle::new(
            &target(name, vec![PathBuf::from("main.js")]),
            "export const answer = 42;\n".to_string(),
        )
    }

    #[test]
    fn es_output_is_unwrapped() {
        let out = bundle(None)
            .render(&output(OutputFormat::Es, PathBuf::from("x.js")))
            .unwrap();
        assert_eq!(out, "export const answer = 42;\n");
    }

    #[test]
    fn umd_output_uses_global_name() {
        let out = bundle(Some("Skills"))
            .render(&output(OutputFormat::Umd, PathBuf::from("x.js")))
            .unwrap();
        assert!(out.contains("global.Skills = factory()"));
        assert!(out.contains("export const answer = 42;"));
    }

    #[test]
    fn umd_without_name_is_rejected() {
        let err = bundle(None)
            .render(&output(OutputFormat::Umd, PathBuf::from("x.js")))
            .expect_err("must fail");
        assert!(matches!(err, BundleError::MissingName { .. }));
    }

    #[test]
    fn iife_renders_with_or_without_name() {
        let out_cfg = output(OutputFormat::Iife, PathBuf::from("x.js"));
        let named = bundle(Some("Skills")).render(&out_cfg).unwrap();
        assert!(named.starts_with("var Skills = (function () {"));

        let anonymous = bundle(None).render(&out_cfg).unwrap();
        assert!(anonymous.starts_with("(function () {"));
        assert!(anonymous.ends_with("})();\n"));
    }

    #[test]
    fn banner_and_footer_surround_wrapped_code() {
        let mut out_cfg = output(OutputFormat::Cjs, PathBuf::from("x.js"));
        out_cfg.banner = Some("/* v1 */".to_string());
        out_cfg.footer = Some("/* end */".to_string());
        let out = bundle(None).render(&out_cfg).unwrap();
        assert!(out.starts_with("/* v1 */\n'use strict';"));
        assert!(out.ends_with("/* end */\n"));
    }

    #[tokio::test]
    async fn source_bundler_concatenates_inputs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.js");
        let b = dir.path().join("b.js");
        std::fs::write(&a, "const a = 1;").unwrap();
        std::fs::write(&b, "const b = 2;\n").unwrap();

        let bundle = SourceBundler
            .build(&target(Some("app"), vec![a, b]))
            .await
            .expect("build should pass");
        assert_eq!(bundle.code, "const a = 1;\nconst b = 2;\n");
        assert!(bundle.warnings.is_empty());
    }

    #[tokio::test]
    async fn source_bundler_fails_on_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = SourceBundler
            .build(&target(None, vec![dir.path().join("missing.js")]))
            .await
            .expect_err("must fail");
        assert!(err.to_string().contains("failed to read input"));
    }

    #[tokio::test]
    async fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("dist/nested/app.js");
        let written = bundle(None)
            .write(&output(OutputFormat::Es, file.clone()))
            .await
            .expect("write should pass");
        assert_eq!(written, file);
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "export const answer = 42;\n"
        );
    }
}
