//! Packet validation and codec errors

use crate::validator::ValidatorKey;
use thiserror::Error;

/// Reasons a VSC packet is rejected before any state is touched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("valset update id must be strictly positive")]
    ZeroValsetUpdateId,

    #[error("validator update {index} has an empty public key")]
    EmptyValidatorKey { index: usize },

    #[error("validator {0} appears more than once in the same packet")]
    DuplicateValidatorKey(ValidatorKey),
}

/// Encoding and decoding failures
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid base58 consensus address: {0}")]
    InvalidAddressEncoding(#[from] bs58::decode::Error),

    #[error("consensus address must be {expected} bytes, got {got}")]
    InvalidAddressLength { expected: usize, got: usize },

    #[error("malformed packet data: {0}")]
    MalformedPacket(#[from] borsh::io::Error),
}
