//! Domain entities - core business objects

mod channel;
mod message;
mod resources;
mod subscription;

pub use channel::Channel;
pub use message::{Message, MessageDto, MessageType};
pub use resources::{ChannelResource, FileAttachmentRecord, LiveResource, ResourceTracker};
pub use subscription::{Subscription, SubscriptionHandle};
