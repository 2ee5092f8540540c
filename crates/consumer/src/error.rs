//! Consumer keeper errors

use crate::params::ParamsError;
use crate::store::StoreError;
use crate::transport::TransportError;
use ccv_types::{CodecError, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsumerError {
    /// The relationship is corrupted; the current block must not proceed
    #[error("VSC packet received on unknown channel {got}; expected {expected}")]
    ChannelMismatch { expected: String, got: String },

    #[error("invalid VSC packet data: {0}")]
    InvalidPacketData(#[from] ValidationError),

    #[error("acknowledgement result length must be 1, got {0}")]
    InvalidAckLength(usize),

    #[error("unrecognized acknowledgement result: {0}")]
    UnknownAckResult(u8),

    #[error("slash packet acknowledged while no slash packet was awaiting a reply")]
    NoSlashInFlight,

    #[error("recv error acknowledgement on non-established channel {0}")]
    NoEstablishedChannel(String),

    #[error("recv error acknowledgement on channel {packet_channel}, but the provider channel is {provider_channel}")]
    ChannelInconsistency {
        provider_channel: String,
        packet_channel: String,
    },

    #[error("closing channel {channel} failed: {source}")]
    ChannelCloseFailed {
        channel: String,
        #[source]
        source: TransportError,
    },

    #[error("invalid consumer params: {0}")]
    InvalidParams(#[from] ParamsError),

    #[error("block time {0} plus the configured period is out of range")]
    TimeOverflow(chrono::DateTime<chrono::Utc>),

    #[error("cannot decode packet data: {0}")]
    Codec(#[from] CodecError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ConsumerError {
    /// Fatal errors mean the provider relationship can no longer be trusted
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConsumerError::ChannelMismatch { .. })
    }
}
