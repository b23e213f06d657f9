//! Attachment ownership records in Redis.
//!
//! Each record maps `attachment:{channel}:{id}` to the password hash of the
//! channel that owns the file, so any node can authorize a download.

use async_trait::async_trait;
use ephemera_core::{AttachmentIndex, DomainResult, FileAttachmentRecord};

use crate::pool::RedisPool;

/// Key prefix for attachment records
pub const ATTACHMENT_PREFIX: &str = "attachment:";

#[must_use]
pub fn attachment_key(record: &FileAttachmentRecord) -> String {
    format!("{ATTACHMENT_PREFIX}{}", record.record_key())
}

#[derive(Debug, Clone)]
pub struct RedisAttachmentIndex {
    pool: RedisPool,
    /// Records outliving their channel expire on their own
    record_ttl_secs: Option<u64>,
}

impl RedisAttachmentIndex {
    #[must_use]
    pub fn new(pool: RedisPool, record_ttl_secs: Option<u64>) -> Self {
        Self {
            pool,
            record_ttl_secs,
        }
    }
}

#[async_trait]
impl AttachmentIndex for RedisAttachmentIndex {
    async fn register(
        &self,
        record: &FileAttachmentRecord,
        password_hash: &str,
    ) -> DomainResult<()> {
        self.pool
            .set(&attachment_key(record), &password_hash, self.record_ttl_secs)
            .await?;
        Ok(())
    }

    async fn password_hash(&self, record: &FileAttachmentRecord) -> DomainResult<Option<String>> {
        Ok(self.pool.get_value(&attachment_key(record)).await?)
    }

    async fn remove(&self, record: &FileAttachmentRecord) -> DomainResult<()> {
        self.pool.delete(&attachment_key(record)).await?;
        Ok(())
    }
}
