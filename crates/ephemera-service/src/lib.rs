//! # ephemera-service
//!
//! Application layer: the channel registry with its expiry scheduler, the
//! single-process backend, and the channel service tying them together.

pub mod local;
pub mod registry;
pub mod services;

pub use local::{LocalAttachmentIndex, LocalFanout, LocalFileStore, LocalHistory};
pub use registry::{ChannelRegistry, ExpiryScheduler};
pub use services::{ChannelService, ChannelTeardown, ServiceContext, ServiceContextBuilder};
