pub mod broadcaster;
pub mod events;
pub mod handler;

pub use broadcaster::{BroadcastError, ChannelHub, Notifier, RealtimeBroadcaster};
pub use events::{
    channel_name, ChannelFrame, MessagesReadPayload, NewMessagePayload, RealtimeEvent, SenderInfo,
    TypingPayload,
};
pub use handler::ws_handler;
