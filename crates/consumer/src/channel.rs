//! Provider channel binding

use crate::error::ConsumerError;
use crate::events::ConsumerEvent;
use crate::keeper::ConsumerKeeper;
use crate::store::ConsumerStore;
use crate::transport::ChannelTransport;

impl<S: ConsumerStore, T: ChannelTransport> ConsumerKeeper<S, T> {
    /// Bind the provider channel on first use, or check a packet arrived on it
    ///
    /// Returns `true` if this call established the binding. A packet on any
    /// other channel after binding is fatal for the relationship.
    pub fn bind_or_verify_channel(&mut self, port: &str, channel_id: &str) -> Result<bool, ConsumerError> {
        match self.store.provider_channel()? {
            Some(bound) if bound == channel_id => Ok(false),
            Some(bound) => {
                tracing::error!(
                    "VSC packet received on unknown channel {}; expected {}",
                    channel_id,
                    bound
                );
                Err(ConsumerError::ChannelMismatch {
                    expected: bound,
                    got: channel_id.to_string(),
                })
            }
            None => {
                self.store.set_provider_channel(channel_id)?;
                tracing::info!("CCV channel established: port {}, channel {}", port, channel_id);

                self.events.emit(ConsumerEvent::ChannelEstablished {
                    port: port.to_string(),
                    channel: channel_id.to_string(),
                });
                Ok(true)
            }
        }
    }
}
