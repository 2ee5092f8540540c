//! Validator identities and power updates

use crate::{error::CodecError, CONS_ADDRESS_LEN};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Consensus public key of a validator
#[derive(
    BorshSerialize, BorshDeserialize, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct ValidatorKey(pub Vec<u8>);

impl ValidatorKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Derive the consensus address for this key (first 20 bytes of its blake3 hash)
    pub fn cons_address(&self) -> ConsAddress {
        let hash = blake3::hash(&self.0);
        let mut addr = [0u8; CONS_ADDRESS_LEN];
        addr.copy_from_slice(&hash.as_bytes()[..CONS_ADDRESS_LEN]);
        ConsAddress(addr)
    }
}

impl fmt::Display for ValidatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

impl fmt::Debug for ValidatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorKey({})", self)
    }
}

/// Consensus address of a validator, rendered as base58 on the wire
#[derive(
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
)]
pub struct ConsAddress(pub [u8; CONS_ADDRESS_LEN]);

impl ConsAddress {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Parse from raw bytes, checking the length
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        let arr: [u8; CONS_ADDRESS_LEN] =
            bytes
                .try_into()
                .map_err(|_| CodecError::InvalidAddressLength {
                    expected: CONS_ADDRESS_LEN,
                    got: bytes.len(),
                })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for ConsAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

impl fmt::Debug for ConsAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConsAddress({})", self)
    }
}

impl FromStr for ConsAddress {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s).into_vec()?;
        Self::from_slice(&bytes)
    }
}

/// A single voting power change
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ValidatorUpdate {
    pub pub_key: ValidatorKey,
    /// New voting power; zero removes the validator
    pub power: i64,
}

impl ValidatorUpdate {
    pub fn new(pub_key: ValidatorKey, power: i64) -> Self {
        Self { pub_key, power }
    }
}

/// A validator as seen by the local consensus engine when evidence is found
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validator {
    pub address: ConsAddress,
    pub power: i64,
}

/// Kind of misbehaviour reported in a slash packet
#[derive(BorshSerialize, BorshDeserialize, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Infraction {
    DoubleSign,
    Downtime,
}

impl fmt::Display for Infraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Infraction::DoubleSign => write!(f, "double_sign"),
            Infraction::Downtime => write!(f, "downtime"),
        }
    }
}
