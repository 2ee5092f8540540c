//! Shared fixtures for keeper tests


use crate::keeper::ConsumerKeeper;
use crate::slash_record::SlashRecord;
use crate::store::{ConsumerStore, MemoryStore, StoreError};
use crate::transport::{ChannelState, ChannelTransport, SendError, TransportError};
use crate::types::{BlockContext, PendingPacket};
use ccv_types::{
    ConsAddress, ConsumerPacketData, Packet, Validator, ValidatorKey, ValidatorUpdate, VscPacketData,
    CONSUMER_PORT_ID, PROVIDER_PORT_ID,
};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

pub const PROVIDER_CHANNEL: &str = "channel-0";
pub const COUNTERPARTY_CHANNEL: &str = "channel-provider";

#[derive(Default)]
struct MockState {
    sent: Vec<Packet>,
    next_sequence: u64,
    /// Scripted outcomes for upcoming sends; empty means succeed
    send_script: VecDeque<Result<(), SendError>>,
    channels: HashMap<(String, String), ChannelState>,
    closed: Vec<(String, String)>,
    close_error: Option<TransportError>,
}

/// Records sends and closes; failures can be scripted ahead of time
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next unscripted send attempt fail with `error`
    pub fn fail_next_send(&self, error: SendError) {
        self.state.lock().send_script.push_back(Err(error));
    }

    /// Let the next unscripted send attempt succeed
    pub fn succeed_next_send(&self) {
        self.state.lock().send_script.push_back(Ok(()));
    }

    pub fn fail_close(&self, error: TransportError) {
        self.state.lock().close_error = Some(error);
    }

    pub fn set_channel_state(&self, port: &str, channel: &str, state: ChannelState) {
        self.state
            .lock()
            .channels
            .insert((port.to_string(), channel.to_string()), state);
    }

    pub fn sent(&self) -> Vec<Packet> {
        self.state.lock().sent.clone()
    }

    pub fn sent_data(&self) -> Vec<ConsumerPacketData> {
        self.sent()
            .iter()
            .map(|p| ConsumerPacketData::from_bytes(&p.data).unwrap())
            .collect()
    }

    pub fn last_sent(&self) -> Packet {
        self.state.lock().sent.last().cloned().unwrap()
    }

    pub fn closed(&self) -> Vec<(String, String)> {
        self.state.lock().closed.clone()
    }
}

impl ChannelTransport for MockTransport {
    fn send_packet(
        &mut self,
        source_port: &str,
        source_channel: &str,
        data: Vec<u8>,
        _timeout_timestamp: DateTime<Utc>,
    ) -> Result<u64, SendError> {
        let mut state = self.state.lock();
        if let Some(Err(error)) = state.send_script.pop_front() {
            return Err(error);
        }
        state.next_sequence += 1;
        let sequence = state.next_sequence;
        state.sent.push(Packet {
            sequence,
            source_port: source_port.to_string(),
            source_channel: source_channel.to_string(),
            destination_port: PROVIDER_PORT_ID.to_string(),
            destination_channel: COUNTERPARTY_CHANNEL.to_string(),
            data,
        });
        Ok(sequence)
    }

    fn channel_state(&self, port: &str, channel: &str) -> Option<ChannelState> {
        self.state
            .lock()
            .channels
            .get(&(port.to_string(), channel.to_string()))
            .copied()
    }

    fn close_channel_init(&mut self, port: &str, channel: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(error) = state.close_error.clone() {
            return Err(error);
        }
        state.closed.push((port.to_string(), channel.to_string()));
        state
            .channels
            .insert((port.to_string(), channel.to_string()), ChannelState::Closed);
        Ok(())
    }
}

pub type TestKeeper = ConsumerKeeper<MemoryStore, MockTransport>;

/// Keeper over an in-memory store, plus a handle on its transport
pub fn new_keeper() -> (TestKeeper, MockTransport) {
    let transport = MockTransport::new();
    let keeper = ConsumerKeeper::new(MemoryStore::new(), transport.clone());
    (keeper, transport)
}

/// Block at `height` with time `secs` after a fixed epoch
pub fn block(height: u64, secs: i64) -> BlockContext {
    BlockContext::new(height, at(secs))
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn key(byte: u8) -> ValidatorKey {
    ValidatorKey::new(vec![byte; 32])
}

pub fn update(byte: u8, power: i64) -> ValidatorUpdate {
    ValidatorUpdate::new(key(byte), power)
}

pub fn validator(byte: u8) -> Validator {
    Validator {
        address: key(byte).cons_address(),
        power: 100,
    }
}

/// Envelope of a VSC packet arriving on `channel`
pub fn vsc_packet(channel: &str, data: &VscPacketData) -> Packet {
    Packet {
        sequence: data.valset_update_id,
        source_port: PROVIDER_PORT_ID.to_string(),
        source_channel: COUNTERPARTY_CHANNEL.to_string(),
        destination_port: CONSUMER_PORT_ID.to_string(),
        destination_channel: channel.to_string(),
        data: data.to_bytes(),
    }
}

/// Deliver a VSC packet on the provider channel
pub fn recv_vsc(
    keeper: &mut TestKeeper,
    ctx: &BlockContext,
    data: VscPacketData,
) -> Result<(), crate::ConsumerError> {
    let packet = vsc_packet(PROVIDER_CHANNEL, &data);
    keeper.on_recv_vsc_packet(ctx, &packet, data)
}

/// Bind the provider channel with an empty VSC packet
pub fn establish(keeper: &mut TestKeeper) {
    recv_vsc(keeper, &block(1, 0), VscPacketData::new(1, vec![], vec![])).unwrap();
}

#[derive(Default)]
struct FlakyState {
    /// Scripted outcomes for upcoming slash record writes; `true` fails
    slash_record_writes: VecDeque<bool>,
    fail_next_append: bool,
}

/// In-memory store whose writes can be made to fail
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    state: Arc<Mutex<FlakyState>>,
}

impl FlakyStore {
    pub fn allow_slash_record_write(&self) {
        self.state.lock().slash_record_writes.push_back(false);
    }

    pub fn fail_slash_record_write(&self) {
        self.state.lock().slash_record_writes.push_back(true);
    }

    pub fn fail_next_append(&self) {
        self.state.lock().fail_next_append = true;
    }

    fn injected(what: &str) -> StoreError {
        StoreError::Corrupt {
            tree: "metadata",
            reason: format!("injected {} failure", what),
        }
    }
}

impl ConsumerStore for FlakyStore {
    fn provider_channel(&self) -> Result<Option<String>, StoreError> {
        self.inner.provider_channel()
    }

    fn set_provider_channel(&mut self, channel_id: &str) -> Result<(), StoreError> {
        self.inner.set_provider_channel(channel_id)
    }

    fn pending_changes(&self) -> Result<Vec<ValidatorUpdate>, StoreError> {
        self.inner.pending_changes()
    }

    fn set_pending_changes(&mut self, updates: &[ValidatorUpdate]) -> Result<(), StoreError> {
        self.inner.set_pending_changes(updates)
    }

    fn height_valset_update_id(&self, height: u64) -> Result<Option<u64>, StoreError> {
        self.inner.height_valset_update_id(height)
    }

    fn set_height_valset_update_id(&mut self, height: u64, valset_update_id: u64) -> Result<(), StoreError> {
        self.inner.set_height_valset_update_id(height, valset_update_id)
    }

    fn delete_height_valset_update_id(&mut self, height: u64) -> Result<(), StoreError> {
        self.inner.delete_height_valset_update_id(height)
    }

    fn height_valset_update_ids(&self) -> Result<Vec<(u64, u64)>, StoreError> {
        self.inner.height_valset_update_ids()
    }

    fn is_outstanding_downtime(&self, address: &ConsAddress) -> Result<bool, StoreError> {
        self.inner.is_outstanding_downtime(address)
    }

    fn set_outstanding_downtime(&mut self, address: &ConsAddress) -> Result<(), StoreError> {
        self.inner.set_outstanding_downtime(address)
    }

    fn delete_outstanding_downtime(&mut self, address: &ConsAddress) -> Result<(), StoreError> {
        self.inner.delete_outstanding_downtime(address)
    }

    fn outstanding_downtimes(&self) -> Result<Vec<ConsAddress>, StoreError> {
        self.inner.outstanding_downtimes()
    }

    fn pending_packets(&self) -> Result<Vec<PendingPacket>, StoreError> {
        self.inner.pending_packets()
    }

    fn append_pending_packet(&mut self, data: ConsumerPacketData) -> Result<u64, StoreError> {
        if std::mem::take(&mut self.state.lock().fail_next_append) {
            return Err(Self::injected("append"));
        }
        self.inner.append_pending_packet(data)
    }

    fn delete_pending_packets(&mut self, idxs: &[u64]) -> Result<(), StoreError> {
        self.inner.delete_pending_packets(idxs)
    }

    fn delete_head_of_pending_packets(&mut self) -> Result<Option<PendingPacket>, StoreError> {
        self.inner.delete_head_of_pending_packets()
    }

    fn slash_record(&self) -> Result<SlashRecord, StoreError> {
        self.inner.slash_record()
    }

    fn set_slash_record(&mut self, record: SlashRecord) -> Result<(), StoreError> {
        if self.state.lock().slash_record_writes.pop_front() == Some(true) {
            return Err(Self::injected("slash record write"));
        }
        self.inner.set_slash_record(record)
    }

    fn packet_maturity_times(&self) -> Result<Vec<(u64, DateTime<Utc>)>, StoreError> {
        self.inner.packet_maturity_times()
    }

    fn set_packet_maturity_time(&mut self, valset_update_id: u64, maturity: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.set_packet_maturity_time(valset_update_id, maturity)
    }

    fn delete_packet_maturity_time(&mut self, valset_update_id: u64) -> Result<(), StoreError> {
        self.inner.delete_packet_maturity_time(valset_update_id)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.inner.commit()
    }
}

/// Keeper over a `FlakyStore`, with handles on the store and transport
pub fn new_flaky_keeper() -> (ConsumerKeeper<FlakyStore, MockTransport>, FlakyStore, MockTransport) {
    let store = FlakyStore::default();
    let transport = MockTransport::new();
    let keeper = ConsumerKeeper::new(store.clone(), transport.clone());
    (keeper, store, transport)
}
