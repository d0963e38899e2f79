pub mod channel;
pub mod message;

pub use channel::{BroadcastChannel, ChannelHub, ChannelState, ContextId};
pub use message::{ChangeMessage, ChangePayload, DATA_CHANGED};
