//! Channel transport - the boundary to the packet delivery layer
//!
//! The keeper never frames or delivers bytes itself. It hands packet data to a
//! `ChannelTransport` and only distinguishes an expired client from any other
//! send failure.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Channel end state as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Init,
    TryOpen,
    Open,
    Closed,
}

/// Why a packet could not be handed to the channel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The channel's light client expired or was frozen; only a client upgrade fixes this
    #[error("client {0} is not active")]
    ClientNotActive(String),

    /// Anything else; retried next block
    #[error("send failed: {0}")]
    Failed(String),
}

impl SendError {
    pub fn is_client_not_active(&self) -> bool {
        matches!(self, SendError::ClientNotActive(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("channel {port}/{channel} not found")]
    ChannelNotFound { port: String, channel: String },

    #[error("channel {0} is already closed")]
    ChannelAlreadyClosed(String),

    #[error("transport error: {0}")]
    Other(String),
}

/// Packet delivery layer used by the consumer keeper
pub trait ChannelTransport {
    /// Hand packet data to the channel; returns the packet sequence
    fn send_packet(
        &mut self,
        source_port: &str,
        source_channel: &str,
        data: Vec<u8>,
        timeout_timestamp: DateTime<Utc>,
    ) -> Result<u64, SendError>;

    /// Current state of a channel end, `None` if unknown
    fn channel_state(&self, port: &str, channel: &str) -> Option<ChannelState>;

    /// Start closing a channel from this side
    fn close_channel_init(&mut self, port: &str, channel: &str) -> Result<(), TransportError>;
}
