//! Redis-backed channel state.

mod attachments;
mod history;

pub use attachments::{attachment_key, RedisAttachmentIndex, ATTACHMENT_PREFIX};
pub use history::{history_key, RedisHistory, HISTORY_PREFIX};

use crate::pool::{RedisPool, RedisResult};

/// Remove history and attachment records left by a previous run
///
/// Channel state never survives a restart, so anything found is stale.
pub async fn purge_stale_state(pool: &RedisPool) -> RedisResult<usize> {
    let mut removed = 0;
    for prefix in [HISTORY_PREFIX, ATTACHMENT_PREFIX] {
        removed += pool.delete_matching(&format!("{prefix}*")).await?;
    }
    tracing::info!(removed, "Purged stale Redis state");
    Ok(removed)
}
