//! The connection manager: protocol engine and supporting lookups.

mod diddoc;
mod exchange;
mod invitation;
mod resolution;
mod routing;
mod targets;

use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::error::ExchangeError;
use crate::state::ExchangeState;
use crate::traits::Wallet;
use storage::RecordStore;

pub use invitation::InvitationOptions;

/// Drives the RFC 23 exchange over the collaborators in an [`ExchangeState`].
#[derive(Clone)]
pub struct ExchangeManager {
    state: Arc<ExchangeState>,
}

impl ExchangeManager {
    pub fn new(state: Arc<ExchangeState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &ExchangeState {
        &self.state
    }

    pub(crate) fn config(&self) -> &Config {
        &self.state.config
    }

    pub(crate) fn wallet(&self) -> &dyn Wallet {
        self.state.wallet.as_ref()
    }

    pub(crate) fn store(&self) -> &dyn RecordStore {
        self.state.store.as_ref()
    }

    /// Dispatches a correlated reply if a responder is configured. Returns
    /// whether the message went out.
    pub(crate) async fn send_reply<T: Serialize>(
        &self,
        message: &T,
        connection_id: &str,
    ) -> Result<bool, ExchangeError> {
        match &self.state.responder {
            Some(responder) => {
                responder
                    .send_reply(serde_json::to_value(message)?, connection_id)
                    .await?;
                Ok(true)
            }
            None => {
                tracing::debug!(connection_id, "no responder configured, reply not sent");
                Ok(false)
            }
        }
    }
}
