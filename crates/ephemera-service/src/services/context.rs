//! Service context - dependency container for services
//!
//! Holds the registry and the backend ports selected at startup.

use std::sync::Arc;

use ephemera_cache::{
    purge_stale_state, RedisAttachmentIndex, RedisFanout, RedisHistory, RedisPool,
};
use ephemera_common::{AppConfig, AppError, AppResult, BackendKind, ConfigError, PasswordService};
use ephemera_core::{AttachmentIndex, DomainError, DomainResult, FanoutBus, FileStore, HistoryStore};
use tracing::info;

use crate::local::{LocalAttachmentIndex, LocalFanout, LocalFileStore, LocalHistory};
use crate::registry::ChannelRegistry;

use super::teardown::ChannelTeardown;

const DEFAULT_PAGE_SIZE: usize = 15;

/// Service context containing all dependencies
#[derive(Clone)]
pub struct ServiceContext {
    registry: Arc<ChannelRegistry>,
    fanout: Arc<dyn FanoutBus>,
    history: Arc<dyn HistoryStore>,
    files: Arc<dyn FileStore>,
    attachments: Arc<dyn AttachmentIndex>,
    page_size: usize,
}

impl ServiceContext {
    /// Wire up every dependency and register channel teardown
    pub fn new(
        registry: Arc<ChannelRegistry>,
        fanout: Arc<dyn FanoutBus>,
        history: Arc<dyn HistoryStore>,
        files: Arc<dyn FileStore>,
        attachments: Arc<dyn AttachmentIndex>,
        page_size: usize,
    ) -> Self {
        registry.subscribe_to_destruction(Arc::new(ChannelTeardown::new(
            fanout.clone(),
            history.clone(),
            files.clone(),
            attachments.clone(),
        )));

        Self {
            registry,
            fanout,
            history,
            files,
            attachments,
            page_size,
        }
    }

    /// Build the context described by the configuration
    ///
    /// Purges state left over from a previous run when configured to.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        let registry = ChannelRegistry::new(Arc::new(PasswordService::new()), config.channel.ttl());

        let file_store = LocalFileStore::new(&config.storage.root);
        if config.storage.purge_on_startup {
            file_store.purge().await?;
        }
        let files: Arc<dyn FileStore> = Arc::new(file_store);

        let builder = ServiceContextBuilder::new()
            .registry(registry.clone())
            .files(files)
            .page_size(config.history.page_size);

        let builder = match config.backend {
            BackendKind::Local => builder
                .fanout(Arc::new(LocalFanout::new(config.fanout.buffer)))
                .history(Arc::new(LocalHistory::new(config.history.max_messages)))
                .attachments(Arc::new(LocalAttachmentIndex::new(&registry))),
            BackendKind::Redis => {
                let redis = config
                    .redis
                    .as_ref()
                    .ok_or(ConfigError::MissingVar("REDIS_URL"))?;
                let pool = RedisPool::from_config(redis).map_err(AppError::cache)?;
                pool.health_check().await.map_err(AppError::cache)?;
                if config.storage.purge_on_startup {
                    purge_stale_state(&pool).await.map_err(AppError::cache)?;
                }

                builder
                    .fanout(Arc::new(RedisFanout::new(pool.clone(), config.fanout.buffer).await?))
                    .history(Arc::new(RedisHistory::new(pool.clone(), config.history.max_messages)))
                    .attachments(Arc::new(RedisAttachmentIndex::new(
                        pool,
                        Some(config.channel.ttl_secs),
                    )))
            }
        };

        let ctx = builder.build()?;
        info!(
            backend = ?config.backend,
            ttl_secs = config.channel.ttl_secs,
            storage_root = %config.storage.root,
            "Service context ready"
        );
        Ok(ctx)
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    pub fn fanout(&self) -> &dyn FanoutBus {
        self.fanout.as_ref()
    }

    pub fn history(&self) -> &dyn HistoryStore {
        self.history.as_ref()
    }

    pub fn files(&self) -> &dyn FileStore {
        self.files.as_ref()
    }

    pub fn attachments(&self) -> &dyn AttachmentIndex {
        self.attachments.as_ref()
    }

    /// Messages returned by a listing without explicit bounds
    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("registry", &self.registry)
            .field("page_size", &self.page_size)
            .field("backends", &"...")
            .finish()
    }
}

/// Builder for creating ServiceContext with custom backends
#[derive(Default)]
pub struct ServiceContextBuilder {
    registry: Option<Arc<ChannelRegistry>>,
    fanout: Option<Arc<dyn FanoutBus>>,
    history: Option<Arc<dyn HistoryStore>>,
    files: Option<Arc<dyn FileStore>>,
    attachments: Option<Arc<dyn AttachmentIndex>>,
    page_size: Option<usize>,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(mut self, registry: Arc<ChannelRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn fanout(mut self, fanout: Arc<dyn FanoutBus>) -> Self {
        self.fanout = Some(fanout);
        self
    }

    pub fn history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn files(mut self, files: Arc<dyn FileStore>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn attachments(mut self, attachments: Arc<dyn AttachmentIndex>) -> Self {
        self.attachments = Some(attachments);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Build the ServiceContext
    ///
    /// # Errors
    /// Returns `DomainError::InternalError` if a required dependency is missing
    pub fn build(self) -> DomainResult<ServiceContext> {
        let missing = |what: &str| DomainError::InternalError(format!("{what} is required"));

        Ok(ServiceContext::new(
            self.registry.ok_or_else(|| missing("registry"))?,
            self.fanout.ok_or_else(|| missing("fanout"))?,
            self.history.ok_or_else(|| missing("history"))?,
            self.files.ok_or_else(|| missing("files"))?,
            self.attachments.ok_or_else(|| missing("attachments"))?,
            self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        ))
    }
}

impl std::fmt::Debug for ServiceContextBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContextBuilder")
            .field("registry", &self.registry.is_some())
            .field("fanout", &self.fanout.is_some())
            .field("history", &self.history.is_some())
            .field("files", &self.files.is_some())
            .field("attachments", &self.attachments.is_some())
            .finish()
    }
}
