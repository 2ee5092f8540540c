//! Shared types for the consumer/provider validator-set channel
//!
//! Both chains agree on these definitions:
//! - Validator keys, consensus addresses and power updates
//! - Validator set change (VSC) packets flowing provider -> consumer
//! - Slash and VSC matured packets flowing consumer -> provider
//! - Acknowledgement result codes

pub mod error;
pub mod packet;
pub mod validator;

pub use error::{CodecError, ValidationError};
pub use packet::{
    Acknowledgement, ConsumerPacketData, ConsumerPacketKind, Packet, SlashPacketData,
    VscMaturedPacketData, VscPacketData,
};
pub use validator::{ConsAddress, Infraction, Validator, ValidatorKey, ValidatorUpdate};

/// Port the consumer side binds on
pub const CONSUMER_PORT_ID: &str = "consumer";

/// Port the provider side binds on
pub const PROVIDER_PORT_ID: &str = "provider";

/// Length of a consensus address in bytes
pub const CONS_ADDRESS_LEN: usize = 20;

/// Ack result: provider queued the slash packet, no retry needed (legacy v1 behaviour)
pub const V1_RESULT: u8 = 1;

/// Ack result: provider handled the slash packet
pub const SLASH_PACKET_HANDLED_RESULT: u8 = 2;

/// Ack result: provider bounced the slash packet, consumer must retry later
pub const SLASH_PACKET_BOUNCED_RESULT: u8 = 3;
