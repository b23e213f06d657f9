//! Channel registry
//!
//! Owns the name → channel map, authenticates callers, and destroys every
//! channel once its TTL has elapsed.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ephemera_core::{Channel, CredentialVerifier, DestructionHandler, DomainError, DomainResult};
use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, error, info, instrument, warn};

use super::ExpiryScheduler;

/// Concurrent registry of live channels
///
/// Must be created inside a Tokio runtime: it starts the expiry scheduler.
pub struct ChannelRegistry {
    channels: DashMap<String, Arc<Channel>>,
    verifier: Arc<dyn CredentialVerifier>,
    ttl: Duration,
    handlers: RwLock<Vec<Arc<dyn DestructionHandler>>>,
    scheduler: ExpiryScheduler<Weak<Channel>>,
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("channels", &self.channels.len())
            .field("ttl", &self.ttl)
            .field("handlers", &self.handlers.read().len())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl ChannelRegistry {
    pub fn new(verifier: Arc<dyn CredentialVerifier>, ttl: Duration) -> Arc<Self> {
        Arc::new_cyclic(|registry: &Weak<Self>| {
            let registry = registry.clone();
            let scheduler = ExpiryScheduler::spawn(move |channel: Weak<Channel>| {
                let (Some(registry), Some(channel)) = (registry.upgrade(), channel.upgrade()) else {
                    return;
                };
                tokio::spawn(async move { registry.destroy(channel).await });
            });

            Self {
                channels: DashMap::new(),
                verifier,
                ttl,
                handlers: RwLock::new(Vec::new()),
                scheduler,
            }
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn verifier(&self) -> &dyn CredentialVerifier {
        self.verifier.as_ref()
    }

    /// Create a channel, failing if the name is live
    #[instrument(skip(self, password))]
    pub fn create_channel(&self, name: &str, password: &str) -> DomainResult<Arc<Channel>> {
        if self.lookup(name).is_some() {
            return Err(DomainError::AlreadyExists(name.to_string()));
        }

        let candidate = self.new_channel(name, password)?;
        match self.channels.entry(name.to_string()) {
            Entry::Occupied(_) => return Err(DomainError::AlreadyExists(name.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(candidate.clone());
            }
        }

        self.activate(&candidate);
        Ok(candidate)
    }

    /// Return the live channel after checking its password, or create it
    ///
    /// Two callers racing to create the same name both end up with the
    /// winner's channel; the loser's password is checked against it.
    #[instrument(skip(self, password))]
    pub fn get_or_create(&self, name: &str, password: &str) -> DomainResult<Arc<Channel>> {
        if let Some(existing) = self.lookup(name) {
            return self.authenticate(existing, password);
        }

        // Hash before touching the map so no shard lock is held during it.
        let candidate = self.new_channel(name, password)?;
        let existing = match self.channels.entry(name.to_string()) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(candidate.clone());
                None
            }
        };

        match existing {
            Some(existing) => self.authenticate(existing, password),
            None => {
                self.activate(&candidate);
                Ok(candidate)
            }
        }
    }

    /// Return the live channel after checking its password; never creates
    pub fn get_or_throw(&self, name: &str, password: &str) -> DomainResult<Arc<Channel>> {
        let channel = self
            .lookup(name)
            .ok_or_else(|| DomainError::ChannelNotFound(name.to_string()))?;
        self.authenticate(channel, password)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Whether `password` opens the live channel `name`
    pub fn check_credentials(&self, name: &str, password: &str) -> bool {
        self.lookup(name)
            .is_some_and(|channel| self.verifier.matches(password, channel.password_hash()))
    }

    /// Unauthenticated lookup for internal collaborators
    ///
    /// A channel whose destruction is under way is still returned; it keeps
    /// its name until every destruction handler has finished.
    pub fn lookup(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.get(name).map(|entry| entry.value().clone())
    }

    /// Register a handler run for every channel destroyed at expiry
    pub fn subscribe_to_destruction(&self, handler: Arc<dyn DestructionHandler>) {
        self.handlers.write().push(handler);
    }

    /// Remove a channel immediately without running destruction handlers
    ///
    /// The scheduled expiry for the removed channel becomes a no-op. Returns
    /// `false` if no live channel had that name.
    pub fn delete_channel(&self, name: &str) -> bool {
        // Retiring inside the shard lock keeps a running destruction in charge
        // of its own entry.
        let removed = self
            .channels
            .remove_if(name, |_, channel| channel.retire())
            .is_some();
        if removed {
            info!(channel = %name, "Channel deleted");
        }
        removed
    }

    /// Run the full destruction protocol now instead of at expiry
    ///
    /// Returns `false` if no live channel had that name.
    pub async fn destroy_now(&self, name: &str) -> bool {
        match self.lookup(name) {
            Some(channel) => self.destroy(channel).await,
            None => false,
        }
    }

    /// Stop the expiry scheduler; channels still live never expire
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn new_channel(&self, name: &str, password: &str) -> DomainResult<Arc<Channel>> {
        let hash = self.verifier.hash(password)?;
        Ok(Arc::new(Channel::new(name, hash, self.ttl)))
    }

    fn activate(&self, channel: &Arc<Channel>) {
        if !self.scheduler.schedule(self.ttl, Arc::downgrade(channel)) {
            warn!(channel = %channel.name(), "Expiry scheduler stopped, channel will not expire");
        }
        info!(
            channel = %channel.name(),
            channel_id = %channel.id(),
            expires_at = %channel.expires_at(),
            "Channel created"
        );
    }

    fn authenticate(&self, channel: Arc<Channel>, password: &str) -> DomainResult<Arc<Channel>> {
        if self.verifier.matches(password, channel.password_hash()) {
            Ok(channel)
        } else {
            debug!(channel = %channel.name(), "Credential mismatch");
            Err(DomainError::CredentialMismatch)
        }
    }

    /// Destroy one incarnation of a channel, at most once
    async fn destroy(&self, channel: Arc<Channel>) -> bool {
        if !channel.retire() {
            return false;
        }
        // Sends already queued drain first; later ones see the channel retired.
        let _sends = channel.lock_sends().await;

        let handlers = self.handlers.read().clone();
        for handler in handlers {
            match AssertUnwindSafe(handler.on_destroy(&channel))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(channel = %channel.name(), error = %e, "Destruction handler failed");
                }
                Err(_) => {
                    error!(channel = %channel.name(), "Destruction handler panicked");
                }
            }
        }

        // The name may already belong to a newer incarnation.
        self.channels
            .remove_if(channel.name(), |_, current| Arc::ptr_eq(current, &channel));

        let closed = channel
            .resources()
            .subscriptions()
            .iter()
            .filter(|handle| handle.close())
            .count();
        channel.resources().clear();

        info!(
            channel = %channel.name(),
            channel_id = %channel.id(),
            closed_subscriptions = closed,
            "Channel destroyed"
        );
        true
    }
}
