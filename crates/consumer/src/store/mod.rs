//! Consumer state storage
//!
//! The keeper is written against `ConsumerStore`. `MemoryStore` keeps
//! everything in process memory; `SledStore` persists to disk.

mod memory;
mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use crate::slash_record::SlashRecord;
use crate::types::PendingPacket;
use ccv_types::{ConsAddress, ConsumerPacketData, ValidatorUpdate};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("corrupt entry in {tree}: {reason}")]
    Corrupt { tree: &'static str, reason: String },
}

/// Storage for all per-relationship consumer state
pub trait ConsumerStore {
    /// Channel bound to the provider, if any
    fn provider_channel(&self) -> Result<Option<String>, StoreError>;
    fn set_provider_channel(&mut self, channel_id: &str) -> Result<(), StoreError>;

    /// Accumulated validator updates not yet applied
    fn pending_changes(&self) -> Result<Vec<ValidatorUpdate>, StoreError>;
    fn set_pending_changes(&mut self, updates: &[ValidatorUpdate]) -> Result<(), StoreError>;

    fn height_valset_update_id(&self, height: u64) -> Result<Option<u64>, StoreError>;
    fn set_height_valset_update_id(&mut self, height: u64, valset_update_id: u64) -> Result<(), StoreError>;
    fn delete_height_valset_update_id(&mut self, height: u64) -> Result<(), StoreError>;
    /// All (height, vsc id) pairs in ascending height order
    fn height_valset_update_ids(&self) -> Result<Vec<(u64, u64)>, StoreError>;

    fn is_outstanding_downtime(&self, address: &ConsAddress) -> Result<bool, StoreError>;
    fn set_outstanding_downtime(&mut self, address: &ConsAddress) -> Result<(), StoreError>;
    fn delete_outstanding_downtime(&mut self, address: &ConsAddress) -> Result<(), StoreError>;
    fn outstanding_downtimes(&self) -> Result<Vec<ConsAddress>, StoreError>;

    /// Queue contents in FIFO order
    fn pending_packets(&self) -> Result<Vec<PendingPacket>, StoreError>;
    /// Append to the tail of the queue; returns the new entry's index
    fn append_pending_packet(&mut self, data: ConsumerPacketData) -> Result<u64, StoreError>;
    fn delete_pending_packets(&mut self, idxs: &[u64]) -> Result<(), StoreError>;
    /// Remove and return the head of the queue
    fn delete_head_of_pending_packets(&mut self) -> Result<Option<PendingPacket>, StoreError>;

    /// Slash record (`Idle` when none is stored)
    fn slash_record(&self) -> Result<SlashRecord, StoreError>;
    fn set_slash_record(&mut self, record: SlashRecord) -> Result<(), StoreError>;

    /// (vsc id, maturity time) pairs ordered by maturity time, then vsc id
    fn packet_maturity_times(&self) -> Result<Vec<(u64, DateTime<Utc>)>, StoreError>;
    fn set_packet_maturity_time(&mut self, valset_update_id: u64, maturity: DateTime<Utc>) -> Result<(), StoreError>;
    fn delete_packet_maturity_time(&mut self, valset_update_id: u64) -> Result<(), StoreError>;

    /// Make every mutation so far durable
    fn commit(&mut self) -> Result<(), StoreError>;
}
