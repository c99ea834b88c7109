use std::ffi::OsString;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::bundle::{Bundle, BundleError, Bundler};
use crate::config::{BundlerConfig, TargetConfig};
use crate::constants::{INPUT_PLACEHOLDER, NAME_PLACEHOLDER};

/// A bundler that delegates to an external program and reads the bundle from its stdout.
#[derive(Debug)]
pub struct CommandBundler {
    config: BundlerConfig,
}

impl CommandBundler {
    pub fn new(config: BundlerConfig) -> Self {
        Self { config }
    }

    /// Expands placeholders for `target`.
    ///
    /// An argument equal to `{input}` becomes one argument per input; when no argument
    /// mentions `{input}` the inputs are appended at the end. Input paths are passed
    /// through as-is, so names that are not UTF-8 reach the program unchanged.
    fn argv(&self, target: &TargetConfig) -> Vec<OsString> {
        let name = target.label();
        let inputs = target.inputs.iter().map(|p| p.as_os_str().to_os_string());

        let mut args = Vec::new();
        let mut saw_input = false;
        for arg in &self.config.args {
            if arg == INPUT_PLACEHOLDER {
                saw_input = true;
                args.extend(inputs.clone());
            } else {
                args.push(OsString::from(arg.replace(NAME_PLACEHOLDER, &name)));
            }
        }
        if !saw_input {
            args.extend(inputs);
        }
        args
    }
}

#[async_trait]
impl Bundler for CommandBundler {
    fn name(&self) -> &str {
        &self.config.program
    }

    #[instrument(skip(self, target), fields(target = %target.label()))]
    async fn build(&self, target: &TargetConfig) -> Result<Bundle> {
        let args = self.argv(target);
        debug!(
            "run {} {}",
            self.config.program,
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let output = Command::new(&self.config.program)
            .args(&args)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("failed to start bundler '{}'", self.config.program))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(BundleError::BundlerFailed {
                program: self.config.program.clone(),
                status: output.status.to_string(),
                target: target.label(),
                stderr: stderr.trim().to_string(),
            }
            .into());
        }

        let code = String::from_utf8(output.stdout).with_context(|| {
            format!("bundler '{}' produced non UTF-8 output", self.config.program)
        })?;

        let mut bundle = Bundle::new(target, code);
        bundle.warnings = stderr
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    fn create_mock_bundler(dir: &Path) -> String {
        let script_path = dir.join("mock-bundler.sh");
        let script = r#"#!/usr/bin/env sh
if [ "$1" = "--fail" ]; then
    echo "syntax error" >&2
    exit 2
fi
echo "unused import in $2" >&2
cat "$2"
echo "// built $1"
"#;
        fs::write(&script_path, script).unwrap();
        let mut perms = fs::metadata(&script_path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script_path, perms).unwrap();
        script_path.to_string_lossy().to_string()
    }

    fn target(input: PathBuf) -> TargetConfig {
        TargetConfig {
            name: Some("app".to_string()),
            inputs: vec![input],
            output: Vec::new(),
        }
    }

    fn bundler(program: String, args: &[&str]) -> CommandBundler {
        CommandBundler::new(BundlerConfig {
            program,
            args: args.iter().map(|s| (*s).to_string()).collect(),
            env: HashMap::new(),
        })
    }

    #[test]
    fn expands_placeholders() {
        let b = bundler("esbuild".to_string(), &["{input}", "--global-name={name}"]);
        let t = TargetConfig {
            name: Some("app".to_string()),
            inputs: vec![PathBuf::from("a.js"), PathBuf::from("b.js")],
            output: Vec::new(),
        };
        assert_eq!(b.argv(&t), vec!["a.js", "b.js", "--global-name=app"]);
    }

    #[test]
    fn appends_inputs_without_placeholder() {
        let b = bundler("esbuild".to_string(), &["--bundle"]);
        let t = target(PathBuf::from("main.js"));
        assert_eq!(b.argv(&t), vec!["--bundle", "main.js"]);
    }

    #[test]
    fn non_utf8_input_paths_pass_through_unchanged() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let raw = OsStr::from_bytes(b"src/\xffmain.js");
        let b = bundler("esbuild".to_string(), &["{input}", "--bundle"]);
        let args = b.argv(&target(PathBuf::from(raw)));
        assert_eq!(args[0].as_bytes(), b"src/\xffmain.js");
        assert_eq!(args[1], "--bundle");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn bundles_input_with_non_utf8_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let program = create_mock_bundler(dir.path());
        let input = dir.path().join(OsStr::from_bytes(b"\xffmain.js"));
        fs::write(&input, "const y = 2;\n").unwrap();

        let b = bundler(program, &["{name}", "{input}"]);
        let bundle = b.build(&target(input)).await.expect("should bundle");
        assert_eq!(bundle.code, "const y = 2;\n// built app\n");
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let program = create_mock_bundler(dir.path());
        let input = dir.path().join("main.js");
        fs::write(&input, "const x = 1;\n").unwrap();

        let b = bundler(program, &["{name}", "{input}"]);
        let bundle = b.build(&target(input)).await.expect("should bundle");
        assert_eq!(bundle.code, "const x = 1;\n// built app\n");
        assert_eq!(bundle.warnings.len(), 1);
        assert!(bundle.warnings[0].starts_with("unused import in"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_build_error() {
        let dir = tempfile::tempdir().unwrap();
        let program = create_mock_bundler(dir.path());
        let b = bundler(program, &["--fail", "{input}"]);
        let err = b
            .build(&target(dir.path().join("main.js")))
            .await
            .expect_err("must fail");
        assert!(err.downcast_ref::<BundleError>().is_some());
        assert!(err.to_string().contains("syntax error"));
    }
}
