//! Resolution of inbound message receipts to connection records.

use serde::{Deserialize, Serialize};

use super::ExchangeManager;
use crate::error::ExchangeError;
use crate::receipt::MessageReceipt;
use crate::record::{ConnectionRecord, Role, State};
use crate::traits::WalletError;

/// Cached outcome of one `(sender_verkey, recipient_verkey)` resolution.
#[derive(Debug, Serialize, Deserialize)]
struct CachedResolution {
    id: String,
    sender_did: Option<String>,
    recipient_did: Option<String>,
    recipient_did_public: bool,
}

impl ExchangeManager {
    /// Maps an inbound receipt to its connection record, going through the
    /// per-key cache when both verkeys are known.
    ///
    /// The cache's per-key lock serializes concurrent lookups for the same
    /// verkey pair: one resolution runs, the rest observe the entry.
    pub async fn find_inbound_connection(
        &self,
        receipt: &MessageReceipt,
    ) -> Result<(Option<ConnectionRecord>, MessageReceipt), ExchangeError> {
        if let (Some(sender_verkey), Some(recipient_verkey)) =
            (&receipt.sender_verkey, &receipt.recipient_verkey)
        {
            if let Some(cache) = &self.state().cache {
                let cache_key =
                    format!("connection_by_verkey::{sender_verkey}::{recipient_verkey}");
                let mut entry = cache.acquire(&cache_key).await;
                if let Some(value) = entry.result() {
                    let cached: CachedResolution = serde_json::from_value(value)?;
                    let mut annotated = receipt.clone();
                    annotated.sender_did = cached.sender_did;
                    annotated.recipient_did = cached.recipient_did;
                    annotated.recipient_did_public = cached.recipient_did_public;
                    let connection =
                        ConnectionRecord::retrieve_by_id(self.store(), &cached.id).await?;
                    return Ok((Some(connection), annotated));
                }

                let (connection, annotated) = self.resolve_inbound_connection(receipt).await?;
                if let Some(connection) = &connection {
                    let value = serde_json::to_value(CachedResolution {
                        id: connection.connection_id.clone(),
                        sender_did: annotated.sender_did.clone(),
                        recipient_did: annotated.recipient_did.clone(),
                        recipient_did_public: annotated.recipient_did_public,
                    })?;
                    entry.set_result(value, self.config().cache_ttl).await;
                }
                return Ok((connection, annotated));
            }
        }

        self.resolve_inbound_connection(receipt).await
    }

    /// Annotates the receipt with the DIDs its verkeys map to and looks up
    /// the matching record. Missing mappings degrade to partial annotation.
    pub async fn resolve_inbound_connection(
        &self,
        receipt: &MessageReceipt,
    ) -> Result<(Option<ConnectionRecord>, MessageReceipt), ExchangeError> {
        let mut annotated = receipt.clone();

        if let Some(sender_verkey) = receipt.sender_verkey.as_deref() {
            match self.find_did_for_key(sender_verkey).await? {
                Some(did) => annotated.sender_did = Some(did),
                None => {
                    tracing::warn!(sender_verkey, "no corresponding DID found for sender verkey")
                }
            }
        }

        if let Some(recipient_verkey) = receipt.recipient_verkey.as_deref() {
            match self.wallet().get_local_did_for_verkey(recipient_verkey).await {
                Ok(my_info) => {
                    annotated.recipient_did = Some(my_info.did);
                    annotated.recipient_did_public = my_info.public;
                }
                Err(WalletError::NotFound(_)) => {
                    tracing::warn!(
                        recipient_verkey,
                        "no corresponding DID found for recipient verkey"
                    )
                }
                Err(err) => return Err(err.into()),
            }
        }

        let connection = self
            .find_connection(
                annotated.sender_did.as_deref(),
                annotated.recipient_did.as_deref(),
                annotated.recipient_verkey.as_deref(),
                true,
            )
            .await?;
        Ok((connection, annotated))
    }

    /// Looks up a connection by DID pair, falling back to the invitation key
    /// for traffic answering one of our outstanding requests.
    ///
    /// With `auto_complete`, a record still in RESPONSE is promoted to
    /// COMPLETED on this first confirmed inbound message.
    pub async fn find_connection(
        &self,
        their_did: Option<&str>,
        my_did: Option<&str>,
        my_verkey: Option<&str>,
        auto_complete: bool,
    ) -> Result<Option<ConnectionRecord>, ExchangeError> {
        let mut connection = match their_did {
            Some(their_did) => {
                ConnectionRecord::find_by_did_pair(self.store(), their_did, my_did, None).await?
            }
            None => None,
        };

        if let Some(connection) = connection.as_mut() {
            if connection.state == State::Response && auto_complete {
                connection.state = State::Completed;
                connection.save(self.store()).await?;
                tracing::info!(
                    connection_id = %connection.connection_id,
                    "connection promoted to completed"
                );
            }
        }

        if connection.is_none() {
            if let Some(my_verkey) = my_verkey {
                connection =
                    ConnectionRecord::find_by_invitation_key(self.store(), my_verkey, Role::Requester)
                        .await?;
                if connection.is_none() {
                    tracing::warn!(
                        my_verkey,
                        "no corresponding connection record found for verkey"
                    );
                }
            }
        }

        Ok(connection)
    }
}
