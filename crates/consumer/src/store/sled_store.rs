//! Persistent consumer store
//!
//! Uses sled embedded database. Integer keys are big-endian so tree iteration
//! order matches numeric order; values are bincode encoded.

use super::{ConsumerStore, StoreError};
use crate::slash_record::SlashRecord;
use crate::types::PendingPacket;
use ccv_types::{ConsAddress, ConsumerPacketData, ValidatorUpdate};
use chrono::{DateTime, Utc};
use sled::Db;
use std::path::Path;

const PROVIDER_CHANNEL_KEY: &str = "provider_channel";
const PENDING_CHANGES_KEY: &str = "pending_changes";
const SLASH_RECORD_KEY: &str = "slash_record";
const NEXT_PACKET_IDX_KEY: &str = "next_packet_idx";

/// Consumer state persisted to disk
pub struct SledStore {
    /// Sled database instance
    db: Db,
    /// Singleton values (channel, pending changes, slash record, counters)
    metadata: sled::Tree,
    /// Local height -> VSC id
    height_to_vsc_id: sled::Tree,
    /// Consensus addresses with an outstanding downtime slash
    outstanding_downtime: sled::Tree,
    /// Queue index -> pending packet
    pending_packets: sled::Tree,
    /// VSC id -> maturity time
    maturity_times: sled::Tree,
}

impl SledStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(&path)?;
        let metadata = db.open_tree("metadata")?;
        let height_to_vsc_id = db.open_tree("height_to_vsc_id")?;
        let outstanding_downtime = db.open_tree("outstanding_downtime")?;
        let pending_packets = db.open_tree("pending_packets")?;
        let maturity_times = db.open_tree("maturity_times")?;

        tracing::info!("Opened consumer store at {:?}", path.as_ref());

        Ok(Self {
            db,
            metadata,
            height_to_vsc_id,
            outstanding_downtime,
            pending_packets,
            maturity_times,
        })
    }

    /// Number of queued packets
    pub fn pending_packet_count(&self) -> usize {
        self.pending_packets.len()
    }

    fn next_packet_idx(&self) -> Result<u64, StoreError> {
        match self.metadata.get(NEXT_PACKET_IDX_KEY)? {
            Some(bytes) => decode_u64("metadata", &bytes),
            None => Ok(0),
        }
    }
}

fn decode_u64(tree: &'static str, bytes: &[u8]) -> Result<u64, StoreError> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| StoreError::Corrupt {
        tree,
        reason: format!("expected 8 bytes, got {}", bytes.len()),
    })?;
    Ok(u64::from_be_bytes(arr))
}

impl ConsumerStore for SledStore {
    fn provider_channel(&self) -> Result<Option<String>, StoreError> {
        match self.metadata.get(PROVIDER_CHANNEL_KEY)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn set_provider_channel(&mut self, channel_id: &str) -> Result<(), StoreError> {
        let bytes = bincode::serialize(channel_id)?;
        self.metadata.insert(PROVIDER_CHANNEL_KEY, bytes)?;
        Ok(())
    }

    fn pending_changes(&self) -> Result<Vec<ValidatorUpdate>, StoreError> {
        match self.metadata.get(PENDING_CHANGES_KEY)? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    fn set_pending_changes(&mut self, updates: &[ValidatorUpdate]) -> Result<(), StoreError> {
        if updates.is_empty() {
            self.metadata.remove(PENDING_CHANGES_KEY)?;
        } else {
            let bytes = bincode::serialize(updates)?;
            self.metadata.insert(PENDING_CHANGES_KEY, bytes)?;
        }
        Ok(())
    }

    fn height_valset_update_id(&self, height: u64) -> Result<Option<u64>, StoreError> {
        match self.height_to_vsc_id.get(height.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode_u64("height_to_vsc_id", &bytes)?)),
            None => Ok(None),
        }
    }

    fn set_height_valset_update_id(&mut self, height: u64, valset_update_id: u64) -> Result<(), StoreError> {
        self.height_to_vsc_id
            .insert(height.to_be_bytes(), valset_update_id.to_be_bytes().to_vec())?;
        Ok(())
    }

    fn delete_height_valset_update_id(&mut self, height: u64) -> Result<(), StoreError> {
        self.height_to_vsc_id.remove(height.to_be_bytes())?;
        Ok(())
    }

    fn height_valset_update_ids(&self) -> Result<Vec<(u64, u64)>, StoreError> {
        let mut out = Vec::new();
        for result in self.height_to_vsc_id.iter() {
            let (key, value) = result?;
            out.push((
                decode_u64("height_to_vsc_id", &key)?,
                decode_u64("height_to_vsc_id", &value)?,
            ));
        }
        Ok(out)
    }

    fn is_outstanding_downtime(&self, address: &ConsAddress) -> Result<bool, StoreError> {
        Ok(self.outstanding_downtime.contains_key(address.as_bytes())?)
    }

    fn set_outstanding_downtime(&mut self, address: &ConsAddress) -> Result<(), StoreError> {
        self.outstanding_downtime.insert(address.as_bytes(), vec![1u8])?;
        Ok(())
    }

    fn delete_outstanding_downtime(&mut self, address: &ConsAddress) -> Result<(), StoreError> {
        self.outstanding_downtime.remove(address.as_bytes())?;
        Ok(())
    }

    fn outstanding_downtimes(&self) -> Result<Vec<ConsAddress>, StoreError> {
        let mut out = Vec::new();
        for result in self.outstanding_downtime.iter() {
            let (key, _) = result?;
            let address = ConsAddress::from_slice(&key).map_err(|e| StoreError::Corrupt {
                tree: "outstanding_downtime",
                reason: e.to_string(),
            })?;
            out.push(address);
        }
        Ok(out)
    }

    fn pending_packets(&self) -> Result<Vec<PendingPacket>, StoreError> {
        let mut out = Vec::with_capacity(self.pending_packets.len());
        for result in self.pending_packets.iter() {
            let (_, value) = result?;
            out.push(bincode::deserialize(&value)?);
        }
        Ok(out)
    }

    fn append_pending_packet(&mut self, data: ConsumerPacketData) -> Result<u64, StoreError> {
        let idx = self.next_packet_idx()?;
        let packet = PendingPacket { idx, data };
        self.pending_packets
            .insert(idx.to_be_bytes(), bincode::serialize(&packet)?)?;
        self.metadata
            .insert(NEXT_PACKET_IDX_KEY, (idx + 1).to_be_bytes().to_vec())?;
        Ok(idx)
    }

    fn delete_pending_packets(&mut self, idxs: &[u64]) -> Result<(), StoreError> {
        for idx in idxs {
            self.pending_packets.remove(idx.to_be_bytes())?;
        }
        Ok(())
    }

    fn delete_head_of_pending_packets(&mut self) -> Result<Option<PendingPacket>, StoreError> {
        match self.pending_packets.pop_min()? {
            Some((_, value)) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn slash_record(&self) -> Result<SlashRecord, StoreError> {
        match self.metadata.get(SLASH_RECORD_KEY)? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(SlashRecord::Idle),
        }
    }

    fn set_slash_record(&mut self, record: SlashRecord) -> Result<(), StoreError> {
        if record == SlashRecord::Idle {
            self.metadata.remove(SLASH_RECORD_KEY)?;
        } else {
            self.metadata
                .insert(SLASH_RECORD_KEY, bincode::serialize(&record)?)?;
        }
        Ok(())
    }

    fn packet_maturity_times(&self) -> Result<Vec<(u64, DateTime<Utc>)>, StoreError> {
        let mut out = Vec::new();
        for result in self.maturity_times.iter() {
            let (key, value) = result?;
            let id = decode_u64("maturity_times", &key)?;
            let maturity: DateTime<Utc> = bincode::deserialize(&value)?;
            out.push((id, maturity));
        }
        out.sort_by_key(|(id, t)| (*t, *id));
        Ok(out)
    }

    fn set_packet_maturity_time(&mut self, valset_update_id: u64, maturity: DateTime<Utc>) -> Result<(), StoreError> {
        self.maturity_times
            .insert(valset_update_id.to_be_bytes(), bincode::serialize(&maturity)?)?;
        Ok(())
    }

    fn delete_packet_maturity_time(&mut self, valset_update_id: u64) -> Result<(), StoreError> {
        self.maturity_times.remove(valset_update_id.to_be_bytes())?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}
