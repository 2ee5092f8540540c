//! Outbound packet queue
//!
//! Packets to the provider wait here until they can be sent, in FIFO order.
//! A slash packet blocks the queue from the moment it is sent until the
//! provider acknowledges it, so nothing generated after the infraction can
//! overtake it.

use crate::error::ConsumerError;
use crate::events::ConsumerEvent;
use crate::keeper::ConsumerKeeper;
use crate::slash_record::SlashRecord;
use crate::store::ConsumerStore;
use crate::transport::ChannelTransport;
use crate::types::{BlockContext, PendingPacket};
use ccv_types::{
    ConsumerPacketData, Infraction, SlashPacketData, Validator, VscMaturedPacketData,
};
use chrono::{DateTime, Utc};

/// What happened to one packet in the send loop
enum SendStep {
    SentMatured,
    SentSlash,
    Stop,
}

/// Result of asking for a packet to be queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    /// Appended at the given queue index
    Queued(u64),
    /// A downtime slash for this validator is already outstanding
    Skipped,
}

impl<S: ConsumerStore, T: ChannelTransport> ConsumerKeeper<S, T> {
    /// Append a slash packet for `validator`
    ///
    /// At most one downtime slash per validator is outstanding at a time;
    /// the flag is only cleared by a slash ack in a later VSC packet.
    pub fn queue_slash_packet(
        &mut self,
        validator: Validator,
        valset_update_id: u64,
        infraction: Infraction,
    ) -> Result<QueueOutcome, ConsumerError> {
        let downtime = infraction == Infraction::Downtime;

        if downtime && self.store.is_outstanding_downtime(&validator.address)? {
            tracing::debug!(
                "Downtime slash for {} already outstanding, skipping",
                validator.address
            );
            return Ok(QueueOutcome::Skipped);
        }

        let slash = SlashPacketData::new(validator, valset_update_id, infraction);
        let idx = self
            .store
            .append_pending_packet(ConsumerPacketData::Slash(slash))?;

        // The flag never exists without its queued packet
        if downtime {
            self.store.set_outstanding_downtime(&validator.address)?;
        }

        tracing::info!(
            "Slash packet enqueued: vscID {}, validator {}, infraction {}",
            valset_update_id,
            validator.address,
            infraction
        );

        self.events.emit(ConsumerEvent::SlashRequest {
            validator: validator.address,
            valset_update_id,
            infraction,
        });

        Ok(QueueOutcome::Queued(idx))
    }

    /// Append a VSC matured packet
    pub fn queue_vsc_matured(&mut self, valset_update_id: u64) -> Result<u64, ConsumerError> {
        let idx = self
            .store
            .append_pending_packet(ConsumerPacketData::VscMatured(VscMaturedPacketData {
                valset_update_id,
            }))?;
        Ok(idx)
    }

    /// Send queued packets in FIFO order; returns how many were sent
    ///
    /// No-op until the provider channel is established. Stops at the first
    /// send failure, at a slash packet (which stays at the head until it is
    /// acknowledged), or when the slash record forbids sending. Sent VSC
    /// matured packets are removed; everything else stays queued. A store
    /// error stops the loop, but matured packets already handed to the
    /// transport are still removed before the error is returned.
    pub fn send_packets(&mut self, ctx: &BlockContext) -> Result<usize, ConsumerError> {
        let Some(channel_id) = self.store.provider_channel()? else {
            return Ok(0);
        };

        let port = self.params.consumer_port.clone();
        let timeout = ctx
            .time
            .checked_add_signed(self.params.ccv_timeout_period()?)
            .ok_or(ConsumerError::TimeOverflow(ctx.time))?;

        let mut sent_matured = Vec::new();
        let mut sent = 0;
        let mut outcome = Ok(());

        for packet in self.store.pending_packets()? {
            match self.send_pending_packet(ctx, &port, &channel_id, timeout, &packet) {
                Ok(SendStep::SentMatured) => {
                    sent += 1;
                    sent_matured.push(packet.idx);
                }
                Ok(SendStep::SentSlash) => {
                    sent += 1;
                    break;
                }
                Ok(SendStep::Stop) => break,
                Err(e) => {
                    tracing::error!("Store error while sending packet idx {}: {}", packet.idx, e);
                    outcome = Err(e);
                    break;
                }
            }
        }

        self.store.delete_pending_packets(&sent_matured)?;
        outcome.map(|_| sent)
    }

    fn send_pending_packet(
        &mut self,
        ctx: &BlockContext,
        port: &str,
        channel_id: &str,
        timeout: DateTime<Utc>,
        packet: &PendingPacket,
    ) -> Result<SendStep, ConsumerError> {
        let record = self.store.slash_record()?;
        if !record.sending_permitted(ctx.time) {
            return Ok(SendStep::Stop);
        }

        let is_slash = packet.is_slash();
        if is_slash {
            self.store.set_slash_record(SlashRecord::Sending)?;
        }

        match self
            .transport
            .send_packet(port, channel_id, packet.data.to_bytes(), timeout)
        {
            Ok(sequence) => {
                tracing::debug!(
                    "Sent {} packet idx {} as sequence {}",
                    packet.kind(),
                    packet.idx,
                    sequence
                );

                if is_slash {
                    self.store.set_slash_record(SlashRecord::on_send(ctx.time))?;
                    return Ok(SendStep::SentSlash);
                }
                Ok(SendStep::SentMatured)
            }
            Err(e) => {
                if is_slash {
                    self.store.set_slash_record(record)?;
                }

                let client_expired = e.is_client_not_active();
                if client_expired {
                    tracing::info!(
                        "IBC client is expired, cannot send {} packet; leaving packet data stored",
                        packet.kind()
                    );
                } else {
                    tracing::error!(
                        "Cannot send {} packet; leaving packet data stored: {}",
                        packet.kind(),
                        e
                    );
                }

                self.events.emit(ConsumerEvent::SendFailed {
                    kind: packet.kind(),
                    client_expired,
                    reason: e.to_string(),
                });
                Ok(SendStep::Stop)
            }
        }
    }
}
