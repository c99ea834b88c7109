use anyhow::Result;
use async_trait::async_trait;

use crate::config::PublishConfig;

/// A contract for anything able to push a local directory to a remote pages branch.
#[async_trait]
pub trait Publisher: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Publishes `config.dir`; resolves once the remote has accepted the content.
    async fn publish(&self, config: &PublishConfig) -> Result<()>;
}
