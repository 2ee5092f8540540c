//! Packet payloads exchanged over the validator-set channel

use crate::error::{CodecError, ValidationError};
use crate::validator::{Infraction, Validator, ValidatorUpdate};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Validator set change sent by the provider
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct VscPacketData {
    pub valset_update_id: u64,
    /// May be empty when unbonding operations produced no power change
    pub validator_updates: Vec<ValidatorUpdate>,
    /// Base58 consensus addresses whose downtime slash the provider has processed
    pub slash_acks: Vec<String>,
}

impl VscPacketData {
    pub fn new(valset_update_id: u64, validator_updates: Vec<ValidatorUpdate>, slash_acks: Vec<String>) -> Self {
        Self {
            valset_update_id,
            validator_updates,
            slash_acks,
        }
    }

    /// Stateless checks run before a VSC packet touches any state
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.valset_update_id == 0 {
            return Err(ValidationError::ZeroValsetUpdateId);
        }

        let mut seen = HashSet::with_capacity(self.validator_updates.len());
        for (index, update) in self.validator_updates.iter().enumerate() {
            if update.pub_key.is_empty() {
                return Err(ValidationError::EmptyValidatorKey { index });
            }
            if !seen.insert(&update.pub_key) {
                return Err(ValidationError::DuplicateValidatorKey(update.pub_key.clone()));
            }
        }

        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).expect("VscPacketData serialization should not fail")
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        Ok(borsh::from_slice(data)?)
    }
}

/// Evidence that a validator misbehaved on the consumer chain
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct SlashPacketData {
    pub validator: Validator,
    /// VSC id in effect at the infraction height (0 for the genesis set)
    pub valset_update_id: u64,
    pub infraction: Infraction,
}

impl SlashPacketData {
    pub fn new(validator: Validator, valset_update_id: u64, infraction: Infraction) -> Self {
        Self {
            validator,
            valset_update_id,
            infraction,
        }
    }
}

/// Confirmation that a VSC has matured on the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct VscMaturedPacketData {
    pub valset_update_id: u64,
}

/// Discriminant of a consumer packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum ConsumerPacketKind {
    Slash,
    VscMatured,
}

impl fmt::Display for ConsumerPacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumerPacketKind::Slash => write!(f, "slash"),
            ConsumerPacketKind::VscMatured => write!(f, "vsc_matured"),
        }
    }
}

/// Everything the consumer sends to the provider
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum ConsumerPacketData {
    Slash(SlashPacketData),
    VscMatured(VscMaturedPacketData),
}

impl ConsumerPacketData {
    pub fn kind(&self) -> ConsumerPacketKind {
        match self {
            ConsumerPacketData::Slash(_) => ConsumerPacketKind::Slash,
            ConsumerPacketData::VscMatured(_) => ConsumerPacketKind::VscMatured,
        }
    }

    pub fn valset_update_id(&self) -> u64 {
        match self {
            ConsumerPacketData::Slash(data) => data.valset_update_id,
            ConsumerPacketData::VscMatured(data) => data.valset_update_id,
        }
    }

    /// Serialize for channel transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).expect("ConsumerPacketData serialization should not fail")
    }

    /// Deserialize from channel bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        Ok(borsh::from_slice(data)?)
    }
}

/// Transport envelope around packet bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub sequence: u64,
    pub source_port: String,
    pub source_channel: String,
    pub destination_port: String,
    pub destination_channel: String,
    pub data: Vec<u8>,
}

/// Acknowledgement written by the receiving chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Acknowledgement {
    /// Success payload, one result-code byte for consumer packets
    Result(Vec<u8>),
    /// Outright rejection
    Error(String),
}

impl Acknowledgement {
    pub fn result(code: u8) -> Self {
        Acknowledgement::Result(vec![code])
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Acknowledgement::Error(msg.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Acknowledgement::Result(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::{ConsAddress, ValidatorKey};

    fn update(byte: u8, power: i64) -> ValidatorUpdate {
        ValidatorUpdate::new(ValidatorKey::new(vec![byte; 32]), power)
    }

    #[test]
    fn test_validate_accepts_empty_updates() {
        let data = VscPacketData::new(3, vec![], vec![]);
        assert!(data.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_id() {
        let data = VscPacketData::new(0, vec![update(1, 10)], vec![]);
        assert_eq!(data.validate(), Err(ValidationError::ZeroValsetUpdateId));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_empty_keys() {
        let dup = VscPacketData::new(1, vec![update(1, 10), update(2, 5), update(1, 7)], vec![]);
        assert_eq!(
            dup.validate(),
            Err(ValidationError::DuplicateValidatorKey(ValidatorKey::new(vec![1u8; 32])))
        );

        let empty = VscPacketData::new(
            1,
            vec![update(1, 10), ValidatorUpdate::new(ValidatorKey::new(vec![]), 3)],
            vec![],
        );
        assert_eq!(empty.validate(), Err(ValidationError::EmptyValidatorKey { index: 1 }));
    }

    #[test]
    fn test_consumer_packet_kind_survives_encoding() {
        let slash = ConsumerPacketData::Slash(SlashPacketData::new(
            Validator {
                address: ConsAddress([9u8; 20]),
                power: 100,
            },
            4,
            Infraction::Downtime,
        ));
        let decoded = ConsumerPacketData::from_bytes(&slash.to_bytes()).unwrap();
        assert_eq!(decoded.kind(), ConsumerPacketKind::Slash);
        assert_eq!(decoded.valset_update_id(), 4);
    }

    #[test]
    fn test_truncated_bytes_fail_to_decode() {
        let bytes = ConsumerPacketData::VscMatured(VscMaturedPacketData { valset_update_id: 8 }).to_bytes();
        assert!(ConsumerPacketData::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }
}
