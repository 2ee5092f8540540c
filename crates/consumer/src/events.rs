//! Consumer events
//!
//! Events go out over a tokio broadcast channel. Sending never blocks and is
//! dropped when nobody is subscribed.

use ccv_types::{ConsAddress, ConsumerPacketKind, Infraction};
use tokio::sync::broadcast;

/// Observable consumer events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerEvent {
    /// First VSC packet received; the provider channel is now bound
    ChannelEstablished { port: String, channel: String },
    /// A slash packet was queued for the provider
    SlashRequest {
        validator: ConsAddress,
        valset_update_id: u64,
        infraction: Infraction,
    },
    /// A queued packet could not be sent this block
    SendFailed {
        kind: ConsumerPacketKind,
        client_expired: bool,
        reason: String,
    },
    /// The provider rejected a packet outright
    ErrorAcknowledgement { channel: String, error: String },
}

/// Best-effort event sink
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ConsumerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to consumer events
    pub fn subscribe(&self) -> broadcast::Receiver<ConsumerEvent> {
        self.sender.subscribe()
    }

    /// Emit an event (ignored if there are no subscribers)
    pub fn emit(&self, event: ConsumerEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::EVENT_CHANNEL_CAPACITY)
    }
}
