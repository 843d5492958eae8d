use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;

use super::events::{channel_name, ChannelFrame, RealtimeEvent};

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Publish timed out after {0:?}")]
    TimedOut(Duration),
}

/// Best-effort, at-most-once delivery to live subscribers of a channel.
/// Never the source of truth: nothing is persisted or replayed.
#[async_trait]
pub trait RealtimeBroadcaster: Send + Sync {
    async fn publish(&self, channel: &str, event: &RealtimeEvent) -> Result<(), BroadcastError>;
}

/// In-process broadcaster: one tokio broadcast channel per conversation topic.
#[derive(Clone)]
pub struct ChannelHub {
    channels: Arc<DashMap<String, broadcast::Sender<ChannelFrame>>>,
    capacity: usize,
}

impl ChannelHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Receives every frame published on `channel` from now on.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<ChannelFrame> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drops the topic once its last subscriber is gone.
    pub fn prune(&self, channel: &str) {
        self.channels
            .remove_if(channel, |_, sender| sender.receiver_count() == 0);
    }
}

#[async_trait]
impl RealtimeBroadcaster for ChannelHub {
    async fn publish(&self, channel: &str, event: &RealtimeEvent) -> Result<(), BroadcastError> {
        let frame = ChannelFrame {
            channel: channel.to_string(),
            event: event.clone(),
        };

        let delivered = match self.channels.get(channel) {
            Some(sender) => sender.send(frame).ok(),
            None => None,
        };

        match delivered {
            Some(receivers) => {
                tracing::debug!(channel, event = event.name(), receivers, "event published");
            }
            None => {
                tracing::debug!(channel, event = event.name(), "no live subscribers, event dropped");
                self.prune(channel);
            }
        }

        Ok(())
    }
}

/// Publishes on behalf of the services. Failures and timeouts are logged and
/// swallowed; the durable mutation that triggered the event stands.
#[derive(Clone)]
pub struct Notifier {
    broadcaster: Arc<dyn RealtimeBroadcaster>,
    timeout: Duration,
}

impl Notifier {
    pub fn new(broadcaster: Arc<dyn RealtimeBroadcaster>, timeout: Duration) -> Self {
        Self {
            broadcaster,
            timeout,
        }
    }

    pub async fn notify(&self, conversation_id: i64, event: RealtimeEvent) -> bool {
        let channel = channel_name(conversation_id);

        let outcome = match tokio::time::timeout(
            self.timeout,
            self.broadcaster.publish(&channel, &event),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(BroadcastError::TimedOut(self.timeout)),
        };

        match outcome {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    channel = %channel,
                    event = event.name(),
                    "realtime publish failed, ignoring: {}",
                    e
                );
                false
            }
        }
    }
}
