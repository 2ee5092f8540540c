//! Core types for the consumer keeper

use ccv_types::{ConsumerPacketData, ConsumerPacketKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Block the scheduler is currently executing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    /// Local block height
    pub height: u64,
    /// Block header time
    pub time: DateTime<Utc>,
}

impl BlockContext {
    pub fn new(height: u64, time: DateTime<Utc>) -> Self {
        Self { height, time }
    }
}

/// A packet waiting in the outbound queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPacket {
    /// Monotonic insertion index, stable for the life of the entry
    pub idx: u64,
    pub data: ConsumerPacketData,
}

impl PendingPacket {
    pub fn kind(&self) -> ConsumerPacketKind {
        self.data.kind()
    }

    pub fn is_slash(&self) -> bool {
        self.kind() == ConsumerPacketKind::Slash
    }
}
