//! The deploy driver: build every target in order, write its outputs, then publish.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::bundle::{Bundle, Bundler};
use crate::config::{LoadedConfig, OutputConfig};
use crate::publish::Publisher;

/// What a deploy run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub targets_built: usize,
    /// Files written, grouped by target in declared order.
    pub written: Vec<PathBuf>,
    pub warnings: usize,
    pub published: bool,
}

#[derive(Debug)]
pub struct Deployer {
    bundler: Box<dyn Bundler>,
    publisher: Box<dyn Publisher>,
    skip_publish: bool,
}

impl Deployer {
    pub fn new(bundler: Box<dyn Bundler>, publisher: Box<dyn Publisher>) -> Self {
        Self {
            bundler,
            publisher,
            skip_publish: false,
        }
    }

    /// Stops after writing outputs; nothing is pushed.
    pub fn skip_publish(mut self, skip: bool) -> Self {
        self.skip_publish = skip;
        self
    }

    /// Runs the whole deploy sequence. The first failing step aborts everything after it.
    #[instrument(skip(self, loaded), fields(bundler = self.bundler.name()))]
    pub async fn run(&self, loaded: &LoadedConfig) -> Result<DeployReport> {
        let mut report = DeployReport::default();

        for warning in &loaded.warnings {
            warn!(target: "pagedeploy", "{}", warning);
        }
        report.warnings += loaded.warnings.len();

        let config = &loaded.config;
        for target in &config.targets {
            let label = target.label();
            info!(target: "pagedeploy", "build {}", label);
            let bundle = self
                .bundler
                .build(target)
                .await
                .with_context(|| format!("failed to build target '{label}'"))?;

            for warning in &bundle.warnings {
                warn!(target: "pagedeploy", "{}: {}", label, warning);
            }
            report.warnings += bundle.warnings.len();

            let written = write_outputs(Arc::new(bundle), &target.output)
                .await
                .with_context(|| format!("failed to write outputs for target '{label}'"))?;
            report.written.extend(written);
            report.targets_built += 1;
        }

        if report.warnings > 0 {
            info!(target: "pagedeploy", "{} warnings", report.warnings);
        }

        if self.skip_publish {
            info!(target: "pagedeploy", "skip publish");
            return Ok(report);
        }

        info!(
            target: "pagedeploy",
            "publish {} to {} via {}",
            config.publish.dir.display(),
            config.publish.branch,
            self.publisher.name()
        );
        self.publisher
            .publish(&config.publish)
            .await
            .with_context(|| format!("failed to publish '{}'", config.publish.dir.display()))?;
        report.published = true;

        Ok(report)
    }
}

/// Writes one bundle to all of its outputs concurrently and waits for every write.
///
/// Returns the written paths in declared order, or the first error in declared order.
async fn write_outputs(bundle: Arc<Bundle>, outputs: &[OutputConfig]) -> Result<Vec<PathBuf>> {
    let mut join_set = JoinSet::new();
    for (index, output) in outputs.iter().cloned().enumerate() {
        let bundle = Arc::clone(&bundle);
        join_set.spawn(async move { (index, bundle.write(&output).await) });
    }

    let mut results = Vec::with_capacity(outputs.len());
    while let Some(joined) = join_set.join_next().await {
        results.push(joined.context("output write task panicked")?);
    }
    results.sort_by_key(|(index, _)| *index);

    results.into_iter().map(|(_, result)| result).collect()
}
