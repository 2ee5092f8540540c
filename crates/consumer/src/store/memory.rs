//! In-memory consumer store

use super::{ConsumerStore, StoreError};
use crate::slash_record::SlashRecord;
use crate::types::PendingPacket;
use ccv_types::{ConsAddress, ConsumerPacketData, ValidatorUpdate};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Process-local consumer state, used by tests and ephemeral nodes
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    provider_channel: Option<String>,
    pending_changes: Vec<ValidatorUpdate>,
    height_to_vsc_id: BTreeMap<u64, u64>,
    outstanding_downtime: BTreeSet<ConsAddress>,
    pending_packets: VecDeque<PendingPacket>,
    next_packet_idx: u64,
    slash_record: SlashRecord,
    maturity_times: BTreeMap<u64, DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConsumerStore for MemoryStore {
    fn provider_channel(&self) -> Result<Option<String>, StoreError> {
        Ok(self.provider_channel.clone())
    }

    fn set_provider_channel(&mut self, channel_id: &str) -> Result<(), StoreError> {
        self.provider_channel = Some(channel_id.to_string());
        Ok(())
    }

    fn pending_changes(&self) -> Result<Vec<ValidatorUpdate>, StoreError> {
        Ok(self.pending_changes.clone())
    }

    fn set_pending_changes(&mut self, updates: &[ValidatorUpdate]) -> Result<(), StoreError> {
        self.pending_changes = updates.to_vec();
        Ok(())
    }

    fn height_valset_update_id(&self, height: u64) -> Result<Option<u64>, StoreError> {
        Ok(self.height_to_vsc_id.get(&height).copied())
    }

    fn set_height_valset_update_id(&mut self, height: u64, valset_update_id: u64) -> Result<(), StoreError> {
        self.height_to_vsc_id.insert(height, valset_update_id);
        Ok(())
    }

    fn delete_height_valset_update_id(&mut self, height: u64) -> Result<(), StoreError> {
        self.height_to_vsc_id.remove(&height);
        Ok(())
    }

    fn height_valset_update_ids(&self) -> Result<Vec<(u64, u64)>, StoreError> {
        Ok(self.height_to_vsc_id.iter().map(|(h, id)| (*h, *id)).collect())
    }

    fn is_outstanding_downtime(&self, address: &ConsAddress) -> Result<bool, StoreError> {
        Ok(self.outstanding_downtime.contains(address))
    }

    fn set_outstanding_downtime(&mut self, address: &ConsAddress) -> Result<(), StoreError> {
        self.outstanding_downtime.insert(*address);
        Ok(())
    }

    fn delete_outstanding_downtime(&mut self, address: &ConsAddress) -> Result<(), StoreError> {
        self.outstanding_downtime.remove(address);
        Ok(())
    }

    fn outstanding_downtimes(&self) -> Result<Vec<ConsAddress>, StoreError> {
        Ok(self.outstanding_downtime.iter().copied().collect())
    }

    fn pending_packets(&self) -> Result<Vec<PendingPacket>, StoreError> {
        Ok(self.pending_packets.iter().cloned().collect())
    }

    fn append_pending_packet(&mut self, data: ConsumerPacketData) -> Result<u64, StoreError> {
        let idx = self.next_packet_idx;
        self.next_packet_idx += 1;
        self.pending_packets.push_back(PendingPacket { idx, data });
        Ok(idx)
    }

    fn delete_pending_packets(&mut self, idxs: &[u64]) -> Result<(), StoreError> {
        if idxs.is_empty() {
            return Ok(());
        }
        let doomed: HashSet<u64> = idxs.iter().copied().collect();
        self.pending_packets.retain(|p| !doomed.contains(&p.idx));
        Ok(())
    }

    fn delete_head_of_pending_packets(&mut self) -> Result<Option<PendingPacket>, StoreError> {
        Ok(self.pending_packets.pop_front())
    }

    fn slash_record(&self) -> Result<SlashRecord, StoreError> {
        Ok(self.slash_record)
    }

    fn set_slash_record(&mut self, record: SlashRecord) -> Result<(), StoreError> {
        self.slash_record = record;
        Ok(())
    }

    fn packet_maturity_times(&self) -> Result<Vec<(u64, DateTime<Utc>)>, StoreError> {
        let mut times: Vec<(u64, DateTime<Utc>)> =
            self.maturity_times.iter().map(|(id, t)| (*id, *t)).collect();
        times.sort_by_key(|(id, t)| (*t, *id));
        Ok(times)
    }

    fn set_packet_maturity_time(&mut self, valset_update_id: u64, maturity: DateTime<Utc>) -> Result<(), StoreError> {
        self.maturity_times.insert(valset_update_id, maturity);
        Ok(())
    }

    fn delete_packet_maturity_time(&mut self, valset_update_id: u64) -> Result<(), StoreError> {
        self.maturity_times.remove(&valset_update_id);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
