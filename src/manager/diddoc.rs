//! Our DID Document construction, document persistence and the key→DID index.

use std::collections::HashMap;

use diddoc::{DidDocument, PublicKey, Service, ED25519_VERIFICATION_KEY_2018, SERVICE_TYPE_INDY_AGENT};
use storage::{StorageError, StorageRecord};

use super::ExchangeManager;
use crate::error::{ExchangeError, RoutingError};
use crate::record::{ConnectionRecord, State};
use crate::traits::DidInfo;

pub const RECORD_TYPE_DID_DOC: &str = "did_doc";
pub const RECORD_TYPE_DID_KEY: &str = "did_key";

/// Upper bound on inbound-router chain length; also rejects cycles.
const MAX_ROUTING_HOPS: usize = 8;

impl ExchangeManager {
    /// Composes our DID Document for `did_info`.
    ///
    /// When an inbound router is attached, the router chain is materialized
    /// into the document: each hop contributes a `routing-{n}` key and the
    /// innermost router's endpoint replaces `endpoints`, so the peer's
    /// outbound path ends at our mediator.
    pub async fn build_did_document(
        &self,
        did_info: &DidInfo,
        inbound_connection_id: Option<&str>,
        endpoints: &[String],
    ) -> Result<DidDocument, ExchangeError> {
        let did = did_info.did.as_str();
        let mut doc = DidDocument::new(did);
        let primary = PublicKey::new(
            did,
            "1",
            ED25519_VERIFICATION_KEY_2018,
            did,
            &did_info.verkey,
            true,
        );
        doc.set_public_key(primary);

        let mut endpoints = endpoints.to_vec();
        let mut routing_keys: Vec<String> = vec![];
        let mut router_id = inbound_connection_id.map(str::to_owned);
        let mut hop = 1;
        while let Some(id) = router_id {
            if hop > MAX_ROUTING_HOPS {
                return Err(RoutingError::RouterMisconfigured(format!(
                    "routing chain exceeds {MAX_ROUTING_HOPS} hops"
                ))
                .into());
            }
            let router = match ConnectionRecord::retrieve_by_id(self.store(), &id).await {
                Ok(router) => router,
                Err(ExchangeError::Storage(StorageError::NotFound)) => {
                    return Err(RoutingError::RouterNotFound(id).into())
                }
                Err(err) => return Err(err),
            };
            if router.state != State::Completed {
                return Err(RoutingError::RouterNotReady(id).into());
            }
            let their_did = router.their_did.as_deref().ok_or_else(|| {
                RoutingError::RouterMisconfigured(format!("router {id} has no DID"))
            })?;
            let routing_doc = self
                .fetch_did_document(their_did)
                .await?
                .map(|(doc, _)| doc)
                .ok_or_else(|| {
                    RoutingError::RouterMisconfigured(format!(
                        "no DID document stored for router {id}"
                    ))
                })?;
            let service = routing_doc.first_service().ok_or_else(|| {
                RoutingError::RouterMisconfigured(format!(
                    "no services defined by routing DID document: {id}"
                ))
            })?;
            if service.service_endpoint.is_empty() {
                return Err(RoutingError::RouterMisconfigured(
                    "routing service has no endpoint".to_owned(),
                )
                .into());
            }
            let recipient_key = service.recipient_keys.first().ok_or_else(|| {
                RoutingError::RouterMisconfigured(
                    "routing service has no recipient keys".to_owned(),
                )
            })?;

            doc.set_public_key(PublicKey::new(
                did,
                &format!("routing-{hop}"),
                ED25519_VERIFICATION_KEY_2018,
                did,
                recipient_key,
                true,
            ));
            routing_keys.push(recipient_key.clone());
            endpoints = vec![service.service_endpoint.clone()];
            hop += 1;
            router_id = router.inbound_connection_id;
        }

        for (index, endpoint) in endpoints.iter().enumerate() {
            let ident = if index == 0 {
                "indy".to_owned()
            } else {
                format!("indy{index}")
            };
            doc.set_service(Service::new(
                did,
                &ident,
                SERVICE_TYPE_INDY_AGENT,
                vec![did_info.verkey.clone()],
                routing_keys.clone(),
                endpoint,
            ));
        }

        Ok(doc)
    }

    /// Loads a stored DID Document together with its backing record.
    pub async fn fetch_did_document(
        &self,
        did: &str,
    ) -> Result<Option<(DidDocument, StorageRecord)>, ExchangeError> {
        let query = HashMap::from([("did".to_owned(), did.to_owned())]);
        let record = self.store().find_one(RECORD_TYPE_DID_DOC, &query).await?;
        match record {
            Some(record) => {
                let doc = DidDocument::from_json(&record.value)?;
                Ok(Some((doc, record)))
            }
            None => Ok(None),
        }
    }

    /// Upserts a peer's DID Document and rebuilds its key index entries.
    ///
    /// Key entries for the DID are dropped before reinsertion so re-storage
    /// after a document update leaves no orphaned mappings.
    pub async fn store_did_document(&self, doc: &DidDocument) -> Result<(), ExchangeError> {
        let value = doc.to_json()?;
        let tags = HashMap::from([("did".to_owned(), doc.did().to_owned())]);
        match self.fetch_did_document(doc.did()).await? {
            Some((_, mut record)) => {
                record.value = value;
                record.tags = tags;
                self.store().update_record(record).await?;
            }
            None => {
                self.store()
                    .add_record(StorageRecord::new(RECORD_TYPE_DID_DOC, value, tags))
                    .await?;
            }
        }
        self.remove_keys_for_did(doc.did()).await?;
        for key in doc.public_keys() {
            if key.controller == doc.did() {
                self.add_key_for_did(doc.did(), &key.value).await?;
            }
        }
        tracing::debug!(did = %doc.did(), "stored DID document");
        Ok(())
    }

    pub async fn add_key_for_did(&self, did: &str, key: &str) -> Result<(), ExchangeError> {
        let tags = HashMap::from([
            ("did".to_owned(), did.to_owned()),
            ("key".to_owned(), key.to_owned()),
        ]);
        self.store()
            .add_record(StorageRecord::new(RECORD_TYPE_DID_KEY, key, tags))
            .await?;
        Ok(())
    }

    /// Which DID owns this key we just received from?
    pub async fn find_did_for_key(&self, key: &str) -> Result<Option<String>, ExchangeError> {
        let query = HashMap::from([("key".to_owned(), key.to_owned())]);
        Ok(self
            .store()
            .find_one(RECORD_TYPE_DID_KEY, &query)
            .await?
            .and_then(|record| record.tags.get("did").cloned()))
    }

    pub async fn remove_keys_for_did(&self, did: &str) -> Result<(), ExchangeError> {
        let query = HashMap::from([("did".to_owned(), did.to_owned())]);
        let keys = self.store().find_all(RECORD_TYPE_DID_KEY, &query).await?;
        for record in keys {
            self.store()
                .delete_record(RECORD_TYPE_DID_KEY, &record.id)
                .await?;
        }
        Ok(())
    }
}
