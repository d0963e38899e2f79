use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use super::message::ChangeMessage;
use crate::core::{RegistryError, Result};

/// Identifies one session on a channel.
pub type ContextId = Uuid;

const DEFAULT_CAPACITY: usize = 64;

lazy_static! {
    static ref GLOBAL_HUB: ChannelHub = ChannelHub::new(DEFAULT_CAPACITY);
}

#[derive(Debug, Clone)]
struct Frame {
    origin: ContextId,
    body: Arc<str>,
}

/// Registry of named broadcast channels.
///
/// Sessions that open the same name on the same hub hear each other. A frame
/// reaches only the subscribers present when it is posted.
pub struct ChannelHub {
    capacity: usize,
    channels: Mutex<HashMap<String, broadcast::Sender<Frame>>>,
}

impl ChannelHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Process-wide hub.
    pub fn global() -> &'static ChannelHub {
        &GLOBAL_HUB
    }

    /// Subscribes `origin` to the channel `name`, creating it on first use.
    pub fn open(&self, name: &str, origin: ContextId) -> Result<BroadcastChannel> {
        self.open_with_capacity(name, origin, self.capacity)
    }

    /// Like [`open`](Self::open), but a channel created by this call buffers
    /// `capacity` frames per listener. An existing channel keeps its capacity.
    pub fn open_with_capacity(
        &self,
        name: &str,
        origin: ContextId,
        capacity: usize,
    ) -> Result<BroadcastChannel> {
        let mut channels = self.channels.lock()?;
        let sender = channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(capacity.max(1)).0)
            .clone();
        let receiver = sender.subscribe();
        debug!(channel = name, origin = %origin, "channel subscribed");

        Ok(BroadcastChannel {
            name: name.to_string(),
            origin,
            sender,
            receiver: Some(receiver),
        })
    }

    /// Live subscriptions on `name`.
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.channels
            .lock()
            .map(|channels| channels.get(name).map_or(0, |s| s.receiver_count()))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Subscribed,
    Closed,
}

/// One session's end of a named channel.
///
/// Dropping it releases the subscription.
pub struct BroadcastChannel {
    name: String,
    origin: ContextId,
    sender: broadcast::Sender<Frame>,
    receiver: Option<broadcast::Receiver<Frame>>,
}

impl BroadcastChannel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> ContextId {
        self.origin
    }

    pub fn state(&self) -> ChannelState {
        if self.receiver.is_some() {
            ChannelState::Subscribed
        } else {
            ChannelState::Closed
        }
    }

    /// Sends `message` to every other subscriber, returning how many there
    /// were. Nobody listening is not an error; the frame is simply lost.
    pub fn post(&self, message: &ChangeMessage) -> Result<usize> {
        if self.receiver.is_none() {
            return Err(RegistryError::Channel(format!("channel '{}' is closed", self.name)));
        }

        let frame = Frame {
            origin: self.origin,
            body: Arc::from(message.encode()?),
        };
        let delivered = match self.sender.send(frame) {
            Ok(receivers) => receivers.saturating_sub(1),
            Err(_) => 0,
        };
        debug!(channel = %self.name, delivered, "change message posted");
        Ok(delivered)
    }

    /// Next pending message from another session, without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeMessage> {
        loop {
            let receiver = self.receiver.as_mut()?;
            match receiver.try_recv() {
                Ok(frame) => {
                    if let Some(message) = self.accept(frame) {
                        return Some(message);
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(channel = %self.name, skipped, "change listener lagged, frames lost");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Waits for the next message from another session. `None` once closed.
    pub async fn recv(&mut self) -> Option<ChangeMessage> {
        loop {
            let receiver = self.receiver.as_mut()?;
            match receiver.recv().await {
                Ok(frame) => {
                    if let Some(message) = self.accept(frame) {
                        return Some(message);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.name, skipped, "change listener lagged, frames lost");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn accept(&self, frame: Frame) -> Option<ChangeMessage> {
        if frame.origin == self.origin {
            return None;
        }
        match ChangeMessage::decode(&frame.body) {
            Ok(message) => message,
            Err(err) => {
                warn!(channel = %self.name, error = %err, "dropping malformed change message");
                None
            }
        }
    }

    /// Releases the subscription. Idempotent.
    pub fn close(&mut self) {
        if self.receiver.take().is_some() {
            debug!(channel = %self.name, origin = %self.origin, "channel closed");
        }
    }
}

impl Drop for BroadcastChannel {
    fn drop(&mut self) {
        self.close();
    }
}
