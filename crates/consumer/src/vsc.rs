//! Validator set change handling
//!
//! VSC packets arrive over an ordered channel, so changes are accumulated:
//! a later power for a validator overwrites an earlier one until the block
//! applies them.

use crate::error::ConsumerError;
use crate::keeper::ConsumerKeeper;
use crate::store::ConsumerStore;
use crate::transport::ChannelTransport;
use crate::types::BlockContext;
use ccv_types::{ConsAddress, Packet, ValidatorKey, ValidatorUpdate, VscPacketData};
use std::collections::HashMap;

/// Merge `new_changes` into `current`, last write wins per validator key
///
/// A validator keeps the position of its first appearance; only its power
/// changes. Validators not seen before are appended in arrival order.
pub fn accumulate_changes(mut current: Vec<ValidatorUpdate>, new_changes: &[ValidatorUpdate]) -> Vec<ValidatorUpdate> {
    let mut positions: HashMap<ValidatorKey, usize> = current
        .iter()
        .enumerate()
        .map(|(i, update)| (update.pub_key.clone(), i))
        .collect();

    for update in new_changes {
        match positions.get(&update.pub_key) {
            Some(&i) => current[i].power = update.power,
            None => {
                positions.insert(update.pub_key.clone(), current.len());
                current.push(update.clone());
            }
        }
    }

    current
}

impl<S: ConsumerStore, T: ChannelTransport> ConsumerKeeper<S, T> {
    /// Handle a VSC packet from the provider
    ///
    /// Validates the data, binds (or checks) the provider channel, accumulates
    /// the power updates, maps the next height to the VSC id, schedules the
    /// VSC's maturity and clears acknowledged downtime slashes.
    pub fn on_recv_vsc_packet(
        &mut self,
        ctx: &BlockContext,
        packet: &Packet,
        data: VscPacketData,
    ) -> Result<(), ConsumerError> {
        data.validate()?;
        let maturity = ctx
            .time
            .checked_add_signed(self.params.unbonding_period()?)
            .ok_or(ConsumerError::TimeOverflow(ctx.time))?;

        self.bind_or_verify_channel(&packet.destination_port, &packet.destination_channel)?;

        let current = self.store.pending_changes()?;
        let pending = accumulate_changes(current, &data.validator_updates);
        self.store.set_pending_changes(&pending)?;

        let block_height = ctx.height + 1;
        self.store
            .set_height_valset_update_id(block_height, data.valset_update_id)?;
        tracing::debug!(
            "Block height {} mapped to vscID {}",
            block_height,
            data.valset_update_id
        );

        self.store
            .set_packet_maturity_time(data.valset_update_id, maturity)?;

        for ack in &data.slash_acks {
            // A bad ack must not fail the packet, or the provider would drop this consumer
            let address = match ack.parse::<ConsAddress>() {
                Ok(address) => address,
                Err(e) => {
                    tracing::error!(
                        "Invalid consensus address in VSC packet slash acks: vscID {}, ack {:?}: {}",
                        data.valset_update_id,
                        ack,
                        e
                    );
                    continue;
                }
            };
            self.store.delete_outstanding_downtime(&address)?;
        }

        tracing::info!(
            "Finished receiving VSC packet: vscID {}, {} updates, {} slash acks",
            data.valset_update_id,
            data.validator_updates.len(),
            data.slash_acks.len()
        );

        Ok(())
    }

    /// Hand the accumulated updates to the block and clear them
    pub fn take_pending_changes(&mut self) -> Result<Vec<ValidatorUpdate>, ConsumerError> {
        let pending = self.store.pending_changes()?;
        if !pending.is_empty() {
            self.store.set_pending_changes(&[])?;
        }
        Ok(pending)
    }

    /// VSC id mapped exactly at `height`
    pub fn height_to_vsc_id(&self, height: u64) -> Result<Option<u64>, ConsumerError> {
        Ok(self.store.height_valset_update_id(height)?)
    }

    /// VSC id in effect at `infraction_height`
    ///
    /// The nearest mapped height at or below the infraction wins; 0 (the
    /// genesis validator set) if there is none.
    pub fn vsc_id_for_infraction(&self, infraction_height: u64) -> Result<u64, ConsumerError> {
        let id = self
            .store
            .height_valset_update_ids()?
            .into_iter()
            .take_while(|(height, _)| *height <= infraction_height)
            .last()
            .map(|(_, id)| id)
            .unwrap_or(0);
        Ok(id)
    }

    /// Drop height mappings strictly below `height`; returns how many were removed
    pub fn prune_height_mappings(&mut self, height: u64) -> Result<usize, ConsumerError> {
        let stale: Vec<u64> = self
            .store
            .height_valset_update_ids()?
            .into_iter()
            .map(|(h, _)| h)
            .take_while(|h| *h < height)
            .collect();

        for h in &stale {
            self.store.delete_height_valset_update_id(*h)?;
        }

        if !stale.is_empty() {
            tracing::debug!("Pruned {} height mappings below {}", stale.len(), height);
        }
        Ok(stale.len())
    }

    /// Queue a VSC matured packet for every VSC whose maturity time has passed
    ///
    /// Height mappings older than the newest matured VSC's own mapping are
    /// pruned; that mapping stays since it is still in effect.
    pub fn queue_vsc_matured_packets(&mut self, ctx: &BlockContext) -> Result<usize, ConsumerError> {
        let mut queued = 0;
        let mut newest_matured = None;

        for (valset_update_id, maturity) in self.store.packet_maturity_times()? {
            if maturity > ctx.time {
                break;
            }
            self.queue_vsc_matured(valset_update_id)?;
            self.store.delete_packet_maturity_time(valset_update_id)?;
            queued += 1;
            newest_matured = newest_matured.max(Some(valset_update_id));

            tracing::info!(
                "VSC matured packet enqueued: vscID {}, maturity {}",
                valset_update_id,
                maturity
            );
        }

        if let Some(matured_id) = newest_matured {
            self.prune_matured_height_mappings(matured_id)?;
        }

        Ok(queued)
    }

    fn prune_matured_height_mappings(&mut self, matured_id: u64) -> Result<usize, ConsumerError> {
        let cutoff = self
            .store
            .height_valset_update_ids()?
            .into_iter()
            .filter(|(_, id)| *id <= matured_id)
            .map(|(height, _)| height)
            .max();

        match cutoff {
            Some(height) => self.prune_height_mappings(height),
            None => Ok(0),
        }
    }
}
