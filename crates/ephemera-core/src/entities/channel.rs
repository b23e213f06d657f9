//! Channel entity - a named, password-gated ephemeral messaging session

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::ResourceTracker;

/// Channel entity
///
/// Immutable apart from its resource bag. The registry hands out
/// `Arc<Channel>`; a destroyed channel may still be referenced by callers but
/// is no longer reachable by name.
#[derive(Debug)]
pub struct Channel {
    id: Uuid,
    name: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    resources: ResourceTracker,
    send_lock: Mutex<()>,
    retired: AtomicBool,
}

impl Channel {
    /// Create a new Channel that expires `ttl` from now
    pub fn new(name: impl Into<String>, password_hash: impl Into<String>, ttl: Duration) -> Self {
        let created_at = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            password_hash: password_hash.into(),
            created_at,
            expires_at,
            resources: ResourceTracker::new(),
            send_lock: Mutex::new(()),
            retired: AtomicBool::new(false),
        }
    }

    /// Identifier of this incarnation of the name
    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[inline]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    #[inline]
    pub fn resources(&self) -> &ResourceTracker {
        &self.resources
    }

    /// Serialize sends so history order matches publish order
    pub async fn lock_sends(&self) -> MutexGuard<'_, ()> {
        self.send_lock.lock().await
    }

    /// Mark the channel as retired
    ///
    /// A retired channel accepts no further sends or listeners. Returns
    /// `true` only for the first caller; destruction uses this to run exactly
    /// once.
    pub fn retire(&self) -> bool {
        !self.retired.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Time left before expiry (zero once past)
    pub fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or_default()
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Channel: {}", self.name)
    }
}
