//! Channel registry and expiry scheduling.

mod channel_registry;
mod scheduler;

pub use channel_registry::ChannelRegistry;
pub use scheduler::ExpiryScheduler;
