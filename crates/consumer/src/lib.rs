//! CCV Consumer - validator set sync and slash packet relay
//!
//! This crate holds the consumer side of the provider/consumer channel:
//! - Binding the single provider channel on the first VSC packet
//! - Accumulating validator power updates until the block applies them
//! - Queueing VSC matured and slash packets, with head-of-line blocking on slashes
//! - Reacting to acknowledgements (handled, bounced, rejected)
//! - Deduplicating downtime slash requests per validator

pub mod ack;
pub mod channel;
pub mod error;
pub mod events;
pub mod keeper;
pub mod params;
pub mod queue;
pub mod slash_record;
pub mod store;
pub mod transport;
pub mod types;
pub mod vsc;

#[cfg(test)]
mod tests;

pub use error::ConsumerError;
pub use events::{ConsumerEvent, EventBus};
pub use keeper::ConsumerKeeper;
pub use params::{ConsumerParams, ParamsError};
pub use queue::QueueOutcome;
pub use slash_record::SlashRecord;
pub use store::{ConsumerStore, MemoryStore, SledStore, StoreError};
pub use transport::{ChannelState, ChannelTransport, SendError, TransportError};
pub use types::{BlockContext, PendingPacket};

/// Capacity of the event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
