//! Assembly of routable targets for outbound traffic.

use diddoc::did_key::normalize_verkey;
use diddoc::DidDocument;
use storage::StorageError;

use super::ExchangeManager;
use crate::error::{ExchangeError, ProtocolError};
use crate::record::{ConnectionRecord, Role, State};
use crate::targets::ConnectionTarget;
use crate::traits::LedgerError;

impl ExchangeManager {
    /// Resolves the targets for a connection, cached per connection id.
    pub async fn get_connection_targets(
        &self,
        connection_id: &str,
        connection: Option<&ConnectionRecord>,
    ) -> Result<Vec<ConnectionTarget>, ExchangeError> {
        let Some(cache) = &self.state().cache else {
            let connection = match connection {
                Some(connection) => connection.clone(),
                None => ConnectionRecord::retrieve_by_id(self.store(), connection_id).await?,
            };
            return self.fetch_connection_targets(&connection).await;
        };

        let cache_key = format!("connection_target::{connection_id}");
        let mut entry = cache.acquire(&cache_key).await;
        if let Some(value) = entry.result() {
            return Ok(serde_json::from_value(value)?);
        }
        let connection = match connection {
            Some(connection) => connection.clone(),
            None => ConnectionRecord::retrieve_by_id(self.store(), connection_id).await?,
        };
        let targets = self.fetch_connection_targets(&connection).await?;
        entry
            .set_result(serde_json::to_value(&targets)?, self.config().cache_ttl)
            .await;
        Ok(targets)
    }

    /// Derives targets from the invitation (pre-handshake, inviter side) or
    /// from the peer's stored DID Document.
    pub async fn fetch_connection_targets(
        &self,
        connection: &ConnectionRecord,
    ) -> Result<Vec<ConnectionTarget>, ExchangeError> {
        let Some(my_did) = connection.my_did.as_deref() else {
            tracing::debug!(
                connection_id = %connection.connection_id,
                "no local DID associated with connection"
            );
            return Ok(vec![]);
        };
        let my_info = self.wallet().get_local_did(my_did).await?;

        if matches!(connection.state, State::Invitation | State::Request)
            && connection.their_role == Role::Requester
        {
            let invitation = connection.retrieve_invitation(self.store()).await?;
            let (endpoint, recipient_keys, routing_keys) = match invitation.did() {
                Some(did) => {
                    // Public-DID invitation: endpoint and key live on the ledger.
                    let ledger = self
                        .state()
                        .ledger
                        .as_ref()
                        .ok_or(LedgerError::Unavailable)?;
                    let endpoint = ledger.get_endpoint_for_did(did).await?;
                    let recipient_keys = vec![ledger.get_key_for_did(did).await?];
                    (endpoint, recipient_keys, vec![])
                }
                None => {
                    let blocks = invitation.service_blocks();
                    let block = blocks.first().ok_or(ProtocolError::MalformedInvitation)?;
                    let recipient_keys = block
                        .recipient_keys
                        .iter()
                        .map(|key| normalize_verkey(key))
                        .collect::<Result<Vec<_>, _>>()?;
                    let routing_keys = block
                        .routing_keys
                        .iter()
                        .map(|key| normalize_verkey(key))
                        .collect::<Result<Vec<_>, _>>()?;
                    (block.service_endpoint.clone(), recipient_keys, routing_keys)
                }
            };

            Ok(vec![ConnectionTarget {
                did: connection.their_did.clone(),
                endpoint,
                label: invitation.label.clone(),
                recipient_keys,
                routing_keys,
                sender_key: my_info.verkey,
            }])
        } else {
            let Some(their_did) = connection.their_did.as_deref() else {
                tracing::debug!(
                    connection_id = %connection.connection_id,
                    "no target DID associated with connection"
                );
                return Ok(vec![]);
            };
            let (doc, _) = self
                .fetch_did_document(their_did)
                .await?
                .ok_or(StorageError::NotFound)?;
            Ok(Self::diddoc_connection_targets(
                &doc,
                &my_info.verkey,
                connection.their_label.as_deref(),
            ))
        }
    }

    /// One target per document service that names recipient keys.
    pub fn diddoc_connection_targets(
        doc: &DidDocument,
        sender_verkey: &str,
        their_label: Option<&str>,
    ) -> Vec<ConnectionTarget> {
        doc.services()
            .filter(|service| !service.recipient_keys.is_empty())
            .map(|service| ConnectionTarget {
                did: Some(doc.did().to_owned()),
                endpoint: service.service_endpoint.clone(),
                label: their_label.map(str::to_owned),
                recipient_keys: service.recipient_keys.clone(),
                routing_keys: service.routing_keys.clone(),
                sender_key: sender_verkey.to_owned(),
            })
            .collect()
    }
}
