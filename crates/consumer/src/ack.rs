//! Acknowledgement handling for packets sent to the provider

use crate::error::ConsumerError;
use crate::events::ConsumerEvent;
use crate::keeper::ConsumerKeeper;
use crate::slash_record::SlashRecord;
use crate::store::ConsumerStore;
use crate::transport::ChannelTransport;
use ccv_types::{
    Acknowledgement, ConsumerPacketData, Packet, SLASH_PACKET_BOUNCED_RESULT,
    SLASH_PACKET_HANDLED_RESULT, V1_RESULT,
};

impl<S: ConsumerStore, T: ChannelTransport> ConsumerKeeper<S, T> {
    /// React to the provider's acknowledgement of `packet`
    pub fn on_acknowledgement(&mut self, packet: &Packet, ack: Acknowledgement) -> Result<(), ConsumerError> {
        match ack {
            Acknowledgement::Result(result) => self.on_result_acknowledgement(packet, &result),
            Acknowledgement::Error(error) => self.on_error_acknowledgement(packet, &error),
        }
    }

    fn on_result_acknowledgement(&mut self, packet: &Packet, result: &[u8]) -> Result<(), ConsumerError> {
        if result.len() != 1 {
            return Err(ConsumerError::InvalidAckLength(result.len()));
        }

        // VSC matured packets left the queue when they were sent
        let data = ConsumerPacketData::from_bytes(&packet.data)?;
        if let ConsumerPacketData::VscMatured(_) = data {
            return Ok(());
        }

        match result[0] {
            V1_RESULT | SLASH_PACKET_HANDLED_RESULT => {
                self.store.set_slash_record(SlashRecord::Idle)?;
                self.delete_head_slash_packet()?;
            }
            SLASH_PACKET_BOUNCED_RESULT => {
                let record = self.store.slash_record()?;
                let bounced = record
                    .on_bounce(self.params.retry_delay_period()?)
                    .ok_or(ConsumerError::NoSlashInFlight)?;
                self.store.set_slash_record(bounced)?;
                tracing::info!(
                    "Slash packet bounced for vscID {}; retrying after backoff",
                    data.valset_update_id()
                );
            }
            code => return Err(ConsumerError::UnknownAckResult(code)),
        }

        Ok(())
    }

    fn delete_head_slash_packet(&mut self) -> Result<(), ConsumerError> {
        let head = self.store.pending_packets()?.into_iter().next();
        match head {
            Some(head) if head.is_slash() => {
                self.store.delete_head_of_pending_packets()?;
                tracing::debug!("Removed handled slash packet idx {} from queue head", head.idx);
            }
            Some(head) => tracing::warn!(
                "Slash acknowledgement received but queue head idx {} is a {} packet",
                head.idx,
                head.kind()
            ),
            None => tracing::warn!("Slash acknowledgement received with an empty queue"),
        }
        Ok(())
    }

    /// The provider rejected the packet; this never happens against a correct provider
    fn on_error_acknowledgement(&mut self, packet: &Packet, error: &str) -> Result<(), ConsumerError> {
        tracing::error!(
            "Received error acknowledgement on channel {}: {}",
            packet.source_channel,
            error
        );
        self.events.emit(ConsumerEvent::ErrorAcknowledgement {
            channel: packet.source_channel.clone(),
            error: error.to_string(),
        });

        self.close_channel(&packet.source_port, &packet.source_channel)?;

        let Some(provider_channel) = self.store.provider_channel()? else {
            return Err(ConsumerError::NoEstablishedChannel(
                packet.source_channel.clone(),
            ));
        };
        if provider_channel != packet.source_channel {
            return Err(ConsumerError::ChannelInconsistency {
                provider_channel,
                packet_channel: packet.source_channel.clone(),
            });
        }

        if packet.source_port != self.params.consumer_port {
            let port = self.params.consumer_port.clone();
            self.close_channel(&port, &provider_channel)?;
        }
        Ok(())
    }

    fn close_channel(&mut self, port: &str, channel: &str) -> Result<(), ConsumerError> {
        self.transport
            .close_channel_init(port, channel)
            .map_err(|source| ConsumerError::ChannelCloseFailed {
                channel: channel.to_string(),
                source,
            })?;
        tracing::warn!("Initiated close of channel {}/{}", port, channel);
        Ok(())
    }
}
