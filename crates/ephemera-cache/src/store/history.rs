//! Channel history as a Redis list, newest first.

use async_trait::async_trait;
use ephemera_core::{DomainResult, HistoryStore, Message};
use redis::AsyncCommands;

use crate::pool::RedisPool;

/// Key prefix for channel history lists
pub const HISTORY_PREFIX: &str = "history:";

#[must_use]
pub fn history_key(channel: &str) -> String {
    format!("{HISTORY_PREFIX}{channel}")
}

/// Inclusive `LRANGE` bounds for a page, `None` when the page is empty
fn page_bounds(start: usize, limit: usize) -> Option<(isize, isize)> {
    if limit == 0 {
        return None;
    }
    let first = isize::try_from(start).ok()?;
    let last = start
        .checked_add(limit - 1)
        .and_then(|last| isize::try_from(last).ok())
        .unwrap_or(isize::MAX);
    Some((first, last))
}

/// History store shared by every node
#[derive(Debug, Clone)]
pub struct RedisHistory {
    pool: RedisPool,
    max_messages: usize,
}

impl RedisHistory {
    #[must_use]
    pub fn new(pool: RedisPool, max_messages: usize) -> Self {
        Self {
            pool,
            max_messages: max_messages.max(1),
        }
    }
}

#[async_trait]
impl HistoryStore for RedisHistory {
    async fn append(&self, channel: &str, message: &Message) -> DomainResult<()> {
        let key = history_key(channel);
        let payload = serde_json::to_string(message)?;
        let keep = isize::try_from(self.max_messages - 1).unwrap_or(isize::MAX);

        let mut conn = self.pool.get().await?;
        redis::pipe()
            .atomic()
            .lpush(&key, &payload)
            .ignore()
            .ltrim(&key, 0, keep)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(crate::pool::RedisPoolError::from)?;

        tracing::trace!(channel = %channel, "Appended to Redis history");
        Ok(())
    }

    async fn range(&self, channel: &str, start: usize, limit: usize) -> DomainResult<Vec<Message>> {
        let Some((first, last)) = page_bounds(start, limit) else {
            return Ok(Vec::new());
        };

        let mut conn = self.pool.get().await?;
        let raw: Vec<String> = conn
            .lrange(history_key(channel), first, last)
            .await
            .map_err(crate::pool::RedisPoolError::from)?;

        raw.iter()
            .map(|payload| serde_json::from_str(payload).map_err(Into::into))
            .collect()
    }

    async fn clear(&self, channel: &str) -> DomainResult<()> {
        self.pool.delete(&history_key(channel)).await?;
        Ok(())
    }
}
