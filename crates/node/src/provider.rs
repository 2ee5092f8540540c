//! In-process provider chain
//!
//! `LoopbackTransport` hands consumer packets to a `SimulatedProvider` over a
//! crossbeam channel. Each block the provider drains what it received,
//! writes acknowledgements and periodically sends a VSC packet back.

use crate::config::SimulationConfig;
use ccv_consumer::{ChannelState, ChannelTransport, SendError, TransportError};
use ccv_types::{
    Acknowledgement, ConsumerPacketData, Infraction, Packet, ValidatorKey, ValidatorUpdate,
    VscPacketData, CONSUMER_PORT_ID, PROVIDER_PORT_ID, SLASH_PACKET_BOUNCED_RESULT,
    SLASH_PACKET_HANDLED_RESULT, V1_RESULT,
};
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use rand::{rngs::StdRng, Rng, SeedableRng};

const COUNTERPARTY_CHANNEL: &str = "channel-provider";

/// Consumer-side end of the loopback channel
pub struct LoopbackTransport {
    outbound: Sender<Packet>,
    next_sequence: u64,
    state: ChannelState,
}

impl LoopbackTransport {
    fn new(outbound: Sender<Packet>) -> Self {
        Self {
            outbound,
            next_sequence: 0,
            state: ChannelState::Open,
        }
    }
}

impl ChannelTransport for LoopbackTransport {
    fn send_packet(
        &mut self,
        source_port: &str,
        source_channel: &str,
        data: Vec<u8>,
        _timeout_timestamp: DateTime<Utc>,
    ) -> Result<u64, SendError> {
        if self.state != ChannelState::Open {
            return Err(SendError::Failed(format!("channel {} is not open", source_channel)));
        }

        self.next_sequence += 1;
        let packet = Packet {
            sequence: self.next_sequence,
            source_port: source_port.to_string(),
            source_channel: source_channel.to_string(),
            destination_port: PROVIDER_PORT_ID.to_string(),
            destination_channel: COUNTERPARTY_CHANNEL.to_string(),
            data,
        };

        self.outbound
            .send(packet)
            .map_err(|_| SendError::ClientNotActive("loopback".to_string()))?;
        Ok(self.next_sequence)
    }

    fn channel_state(&self, _port: &str, _channel: &str) -> Option<ChannelState> {
        Some(self.state)
    }

    fn close_channel_init(&mut self, _port: &str, channel: &str) -> Result<(), TransportError> {
        if self.state == ChannelState::Closed {
            return Err(TransportError::ChannelAlreadyClosed(channel.to_string()));
        }
        self.state = ChannelState::Closed;
        Ok(())
    }
}

/// 32-byte key with the 1-based index in its first eight bytes
fn validator_key(index: u64) -> ValidatorKey {
    let mut key = vec![0u8; 32];
    key[..8].copy_from_slice(&(index + 1).to_be_bytes());
    ValidatorKey::new(key)
}

/// What the provider produced during one block
#[derive(Default)]
pub struct ProviderOutput {
    /// Acknowledgements for packets the consumer sent earlier
    pub acks: Vec<(Packet, Acknowledgement)>,
    /// A new VSC packet, if one was due
    pub vsc: Option<(Packet, VscPacketData)>,
}

/// Provider chain stand-in
pub struct SimulatedProvider {
    inbound: Receiver<Packet>,
    consumer_channel: String,
    validators: Vec<(ValidatorKey, i64)>,
    next_vsc_id: u64,
    slash_acks: Vec<String>,
    config: SimulationConfig,
    rng: StdRng,
}

impl SimulatedProvider {
    /// Create a provider and the transport the consumer keeper should use
    pub fn new(consumer_channel: &str, config: SimulationConfig) -> (Self, LoopbackTransport) {
        let (tx, rx) = unbounded();
        let validators = (0..config.validators as u64)
            .map(|i| (validator_key(i), 100))
            .collect();

        let provider = Self {
            inbound: rx,
            consumer_channel: consumer_channel.to_string(),
            validators,
            next_vsc_id: 1,
            slash_acks: Vec::new(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
        };
        (provider, LoopbackTransport::new(tx))
    }

    /// Validator keys in the provider's set
    pub fn validator_keys(&self) -> Vec<ValidatorKey> {
        self.validators.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Process everything received and emit the next VSC when due
    pub fn step(&mut self, height: u64) -> ProviderOutput {
        let mut output = ProviderOutput::default();

        loop {
            match self.inbound.try_recv() {
                Ok(packet) => {
                    let ack = self.handle_packet(&packet);
                    output.acks.push((packet, ack));
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("Loopback channel disconnected");
                    break;
                }
            }
        }

        let first = self.next_vsc_id == 1;
        if first || height % self.config.vsc_interval.max(1) == 0 {
            output.vsc = Some(self.next_vsc(first));
        }

        output
    }

    fn handle_packet(&mut self, packet: &Packet) -> Acknowledgement {
        let data = match ConsumerPacketData::from_bytes(&packet.data) {
            Ok(data) => data,
            Err(e) => return Acknowledgement::error(e.to_string()),
        };

        match data {
            ConsumerPacketData::VscMatured(matured) => {
                tracing::debug!("Provider: VSC {} matured on consumer", matured.valset_update_id);
                Acknowledgement::result(V1_RESULT)
            }
            ConsumerPacketData::Slash(slash) => {
                if self.rng.gen_bool(self.config.bounce_ratio.clamp(0.0, 1.0)) {
                    tracing::info!("Provider: bouncing slash for {}", slash.validator.address);
                    return Acknowledgement::result(SLASH_PACKET_BOUNCED_RESULT);
                }

                tracing::info!(
                    "Provider: handled {} slash for {}",
                    slash.infraction,
                    slash.validator.address
                );
                if slash.infraction == Infraction::Downtime {
                    self.slash_acks.push(slash.validator.address.to_string());
                }
                Acknowledgement::result(SLASH_PACKET_HANDLED_RESULT)
            }
        }
    }

    fn next_vsc(&mut self, full_set: bool) -> (Packet, VscPacketData) {
        let updates: Vec<ValidatorUpdate> = if full_set {
            self.validators
                .iter()
                .map(|(key, power)| ValidatorUpdate::new(key.clone(), *power))
                .collect()
        } else {
            let i = self.rng.gen_range(0..self.validators.len().max(1));
            match self.validators.get_mut(i) {
                Some((key, power)) => {
                    *power = (*power + self.rng.gen_range(-10..=10)).max(1);
                    vec![ValidatorUpdate::new(key.clone(), *power)]
                }
                None => Vec::new(),
            }
        };

        let data = VscPacketData::new(
            self.next_vsc_id,
            updates,
            std::mem::take(&mut self.slash_acks),
        );
        self.next_vsc_id += 1;

        let packet = Packet {
            sequence: data.valset_update_id,
            source_port: PROVIDER_PORT_ID.to_string(),
            source_channel: COUNTERPARTY_CHANNEL.to_string(),
            destination_port: CONSUMER_PORT_ID.to_string(),
            destination_channel: self.consumer_channel.clone(),
            data: data.to_bytes(),
        };
        (packet, data)
    }
}
