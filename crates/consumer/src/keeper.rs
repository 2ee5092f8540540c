//! Consumer keeper - per-provider relationship state and its entry points
//!
//! The keeper is owned by the block scheduler and driven once per block:
//! - `on_recv_vsc_packet` when a VSC packet arrives
//! - `on_acknowledgement` when the provider acknowledges one of our packets
//! - `end_block` to queue matured VSCs, flush the queue and commit the store
//!
//! Every entry point takes `&mut self`, so no two of them ever run at once.

use crate::error::ConsumerError;
use crate::events::{ConsumerEvent, EventBus};
use crate::params::ConsumerParams;
use crate::slash_record::SlashRecord;
use crate::store::ConsumerStore;
use crate::transport::{ChannelState, ChannelTransport};
use crate::types::{BlockContext, PendingPacket};
use ccv_types::{ConsAddress, ValidatorUpdate};
use tokio::sync::broadcast;

/// Consumer side of a single provider relationship
pub struct ConsumerKeeper<S, T> {
    pub(crate) store: S,
    pub(crate) transport: T,
    pub(crate) params: ConsumerParams,
    pub(crate) events: EventBus,
}

impl<S: ConsumerStore, T: ChannelTransport> ConsumerKeeper<S, T> {
    /// Create a keeper with default parameters
    pub fn new(store: S, transport: T) -> Self {
        Self {
            store,
            transport,
            params: ConsumerParams::default(),
            events: EventBus::default(),
        }
    }

    /// Set the consumer parameters
    pub fn with_params(mut self, params: ConsumerParams) -> Self {
        self.params = params;
        self
    }

    /// Use an existing event bus
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Subscribe to consumer events
    pub fn subscribe(&self) -> broadcast::Receiver<ConsumerEvent> {
        self.events.subscribe()
    }

    pub fn params(&self) -> &ConsumerParams {
        &self.params
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Channel bound to the provider, if established
    pub fn provider_channel(&self) -> Result<Option<String>, ConsumerError> {
        Ok(self.store.provider_channel()?)
    }

    /// Outbound queue in FIFO order
    pub fn pending_packets(&self) -> Result<Vec<PendingPacket>, ConsumerError> {
        Ok(self.store.pending_packets()?)
    }

    /// Accumulated validator updates not yet applied
    pub fn pending_changes(&self) -> Result<Vec<ValidatorUpdate>, ConsumerError> {
        Ok(self.store.pending_changes()?)
    }

    pub fn is_outstanding_downtime(&self, address: &ConsAddress) -> Result<bool, ConsumerError> {
        Ok(self.store.is_outstanding_downtime(address)?)
    }

    pub fn outstanding_downtimes(&self) -> Result<Vec<ConsAddress>, ConsumerError> {
        Ok(self.store.outstanding_downtimes()?)
    }

    pub fn slash_record(&self) -> Result<SlashRecord, ConsumerError> {
        Ok(self.store.slash_record()?)
    }

    /// Whether the provider channel is closed (or was never established)
    pub fn is_channel_closed(&self) -> Result<bool, ConsumerError> {
        let Some(channel_id) = self.store.provider_channel()? else {
            return Ok(true);
        };
        let closed = match self
            .transport
            .channel_state(&self.params.consumer_port, &channel_id)
        {
            None | Some(ChannelState::Closed) => true,
            Some(_) => false,
        };
        Ok(closed)
    }

    /// End-of-block work: queue matured VSCs, send packets, persist
    pub fn end_block(&mut self, ctx: &BlockContext) -> Result<usize, ConsumerError> {
        self.queue_vsc_matured_packets(ctx)?;
        let sent = self.send_packets(ctx)?;
        self.commit()?;
        Ok(sent)
    }

    /// Make all state changes so far durable
    pub fn commit(&mut self) -> Result<(), ConsumerError> {
        self.store.commit()?;
        Ok(())
    }
}
