//! Channel operations and the dependency context behind them

pub mod channel;
pub mod context;
pub mod teardown;

pub use channel::ChannelService;
pub use context::{ServiceContext, ServiceContextBuilder};
pub use teardown::ChannelTeardown;
