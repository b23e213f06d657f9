//! Test helpers for integration tests
//!
//! Provides utilities for starting test nodes, draining subscriptions and
//! downloads, and skipping tests whose backing services are unavailable.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use ephemera_common::{AppConfig, BackendKind, PasswordService, RedisConfig};
use ephemera_core::{Message, StoredFile, Subscription};
use ephemera_service::{
    ChannelRegistry, ChannelService, LocalAttachmentIndex, LocalFanout, LocalFileStore,
    LocalHistory, ServiceContext, ServiceContextBuilder,
};
use futures::StreamExt;
use tokio::io::AsyncReadExt;

/// Default wait for a live message
pub const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// Test node instance that owns its storage directory
pub struct TestNode {
    ctx: ServiceContext,
    root: PathBuf,
}

impl TestNode {
    /// Start a local node with a long channel lifetime
    pub async fn start() -> Result<Self> {
        Self::start_with_config(test_config()).await
    }

    /// Start a node from configuration
    pub async fn start_with_config(config: AppConfig) -> Result<Self> {
        let root = PathBuf::from(&config.storage.root);
        let ctx = ServiceContext::from_config(&config)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to build context: {}", e))?;
        Ok(Self { ctx, root })
    }

    /// Start a local node whose channels expire after `ttl`
    ///
    /// Configuration only allows whole seconds, so sub-second lifetimes are
    /// wired by hand.
    pub fn start_with_ttl(ttl: Duration) -> Result<Self> {
        let root = temp_root();
        let registry = ChannelRegistry::new(Arc::new(PasswordService::new()), ttl);
        let ctx = ServiceContextBuilder::new()
            .registry(registry.clone())
            .fanout(Arc::new(LocalFanout::new(256)))
            .history(Arc::new(LocalHistory::new(1000)))
            .files(Arc::new(LocalFileStore::new(root.clone())))
            .attachments(Arc::new(LocalAttachmentIndex::new(&registry)))
            .build()?;
        Ok(Self { ctx, root })
    }

    pub fn service(&self) -> ChannelService<'_> {
        ChannelService::new(&self.ctx)
    }

    pub fn ctx(&self) -> &ServiceContext {
        &self.ctx
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.ctx.registry().shutdown();
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

/// Fresh storage directory under the system temp dir
pub fn temp_root() -> PathBuf {
    std::env::temp_dir().join(format!("ephemera-it-{}", uuid::Uuid::new_v4()))
}

/// Local-backend configuration with a private storage root
pub fn test_config() -> AppConfig {
    AppConfig::local(temp_root().display().to_string(), Duration::from_secs(60))
}

/// Redis-backend configuration
///
/// Startup purge is off so concurrently running tests sharing one Redis do
/// not wipe each other's keys.
pub fn redis_config(url: &str, ttl: Duration) -> AppConfig {
    let mut config = AppConfig::local(temp_root().display().to_string(), ttl);
    config.backend = BackendKind::Redis;
    config.redis = Some(RedisConfig {
        url: url.to_string(),
        max_connections: 10,
    });
    config
}

/// Helper to check if a Redis instance is available
pub fn check_redis_env() -> Option<String> {
    dotenvy::dotenv().ok();

    match std::env::var("REDIS_URL") {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("Skipping test: REDIS_URL not set");
            None
        }
    }
}

/// Next live message, or `None` if the stream ended or timed out
pub async fn next_message(subscription: &mut Subscription, wait: Duration) -> Option<Message> {
    tokio::time::timeout(wait, subscription.next())
        .await
        .ok()
        .flatten()
}

/// Wait until the subscription completes
pub async fn assert_completes(subscription: &mut Subscription, wait: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        match tokio::time::timeout_at(deadline, subscription.next()).await {
            Ok(None) => return Ok(()),
            Ok(Some(_)) => {}
            Err(_) => anyhow::bail!("Subscription still open after {:?}", wait),
        }
    }
}

/// Read a downloaded file to the end
pub async fn read_all(file: StoredFile) -> Result<Vec<u8>> {
    let mut reader = file.reader;
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(buf)
}
