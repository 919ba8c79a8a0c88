//! Legacy Indy-style DID Documents.
//!
//! Models the pre-`did:peer` document shape exchanged by RFC 23 agents: a DID,
//! a keyed set of Ed25519 public keys and a keyed set of `IndyAgent` services.
//! Serialization follows the legacy wire layout (`publicKey` / `authentication`
//! / `service` arrays); [`DidDocument::canonical_bytes`] yields the canonical
//! JSON form that signed attachments are computed over.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod did_key;

pub const CONTEXT: &str = "https://w3id.org/did/v1";
pub const ED25519_VERIFICATION_KEY_2018: &str = "Ed25519VerificationKey2018";
pub const ED25519_AUTHENTICATION_2018: &str = "Ed25519SignatureAuthentication2018";
pub const SERVICE_TYPE_INDY_AGENT: &str = "IndyAgent";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DidDocError {
    #[error("malformed DID document: {0}")]
    Malformed(String),
    #[error("canonicalization failed: {0}")]
    Canonicalize(String),
    #[error("invalid verkey: {0}")]
    InvalidVerkey(String),
    #[error("invalid did:key: {0}")]
    InvalidDidKey(String),
}

/// A public key entry. The `authn` flag marks keys listed under the
/// document's `authentication` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub id: String,
    pub key_type: String,
    pub controller: String,
    /// Base58-encoded key material.
    pub value: String,
    pub authn: bool,
}

impl PublicKey {
    /// Creates a key with id `{did}#{ident}`.
    pub fn new(
        did: &str,
        ident: &str,
        key_type: &str,
        controller: &str,
        value: &str,
        authn: bool,
    ) -> Self {
        Self {
            id: format!("{did}#{ident}"),
            key_type: key_type.to_owned(),
            controller: controller.to_owned(),
            value: value.to_owned(),
            authn,
        }
    }
}

/// A service entry. Key lists hold raw base58 verkeys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipient_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routing_keys: Vec<String>,
    pub service_endpoint: String,
}

impl Service {
    /// Creates a service with id `{did};{ident}`.
    pub fn new(
        did: &str,
        ident: &str,
        service_type: &str,
        recipient_keys: Vec<String>,
        routing_keys: Vec<String>,
        service_endpoint: &str,
    ) -> Self {
        Self {
            id: format!("{did};{ident}"),
            service_type: service_type.to_owned(),
            recipient_keys,
            routing_keys,
            service_endpoint: service_endpoint.to_owned(),
        }
    }
}

/// A DID Document: public keys and services keyed by their fully-qualified
/// ids, in stable order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "DocumentRaw", from = "DocumentRaw")]
pub struct DidDocument {
    did: String,
    public_key: BTreeMap<String, PublicKey>,
    service: BTreeMap<String, Service>,
}

impl DidDocument {
    pub fn new(did: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            public_key: BTreeMap::new(),
            service: BTreeMap::new(),
        }
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    /// Upserts a public key, keyed by its id.
    pub fn set_public_key(&mut self, key: PublicKey) {
        self.public_key.insert(key.id.clone(), key);
    }

    /// Upserts a service, keyed by its id.
    pub fn set_service(&mut self, service: Service) {
        self.service.insert(service.id.clone(), service);
    }

    pub fn public_keys(&self) -> impl Iterator<Item = &PublicKey> {
        self.public_key.values()
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.service.values()
    }

    pub fn first_service(&self) -> Option<&Service> {
        self.service.values().next()
    }

    pub fn has_services(&self) -> bool {
        !self.service.is_empty()
    }

    pub fn to_json(&self) -> Result<String, DidDocError> {
        serde_json::to_string(self).map_err(|e| DidDocError::Canonicalize(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, DidDocError> {
        serde_json::from_str(json).map_err(|e| DidDocError::Malformed(e.to_string()))
    }

    /// Canonical JSON bytes (RFC 8785), the payload covered by attachment
    /// signatures.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, DidDocError> {
        json_canon::to_string(self)
            .map(String::into_bytes)
            .map_err(|e| DidDocError::Canonicalize(e.to_string()))
    }
}

// === Wire layout ===

fn default_context() -> String {
    CONTEXT.to_owned()
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRaw {
    #[serde(rename = "@context", default = "default_context")]
    context: String,
    #[serde(default)]
    id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    public_key: Vec<PublicKeyRaw>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    authentication: Vec<AuthenticationRaw>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    service: Vec<Service>,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyRaw {
    id: String,
    #[serde(rename = "type")]
    key_type: String,
    controller: String,
    public_key_base58: String,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticationRaw {
    #[serde(rename = "type")]
    auth_type: String,
    public_key: String,
}

impl From<DidDocument> for DocumentRaw {
    fn from(doc: DidDocument) -> Self {
        let authentication = doc
            .public_key
            .values()
            .filter(|k| k.authn)
            .map(|k| AuthenticationRaw {
                auth_type: ED25519_AUTHENTICATION_2018.to_owned(),
                public_key: k.id.clone(),
            })
            .collect();
        let public_key = doc
            .public_key
            .into_values()
            .map(|k| PublicKeyRaw {
                id: k.id,
                key_type: k.key_type,
                controller: k.controller,
                public_key_base58: k.value,
            })
            .collect();
        Self {
            context: CONTEXT.to_owned(),
            id: doc.did,
            public_key,
            authentication,
            service: doc.service.into_values().collect(),
        }
    }
}

impl From<DocumentRaw> for DidDocument {
    fn from(raw: DocumentRaw) -> Self {
        let mut doc = DidDocument::new(raw.id);
        for key in raw.public_key {
            let authn = raw.authentication.iter().any(|a| a.public_key == key.id);
            doc.set_public_key(PublicKey {
                id: key.id,
                key_type: key.key_type,
                controller: key.controller,
                value: key.public_key_base58,
                authn,
            });
        }
        for service in raw.service {
            doc.set_service(service);
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DID: &str = "did:sov:LjgpST2rjsoxYegQDRm7EL";
    const VERKEY: &str = "8HH5gYEeNc3z7PYXmd54d4x6qAfCNrqQqEB3nS7Zfu7K";

    fn sample_doc() -> DidDocument {
        let mut doc = DidDocument::new(DID);
        doc.set_public_key(PublicKey::new(
            DID,
            "1",
            ED25519_VERIFICATION_KEY_2018,
            DID,
            VERKEY,
            true,
        ));
        doc.set_service(Service::new(
            DID,
            "indy",
            SERVICE_TYPE_INDY_AGENT,
            vec![VERKEY.to_owned()],
            vec![],
            "https://agent.example.com",
        ));
        doc
    }

    #[test]
    fn canonicalizes_in_legacy_layout() {
        let canonical = String::from_utf8(sample_doc().canonical_bytes().unwrap()).unwrap();
        assert_eq!(
            canonical,
            "{\"@context\":\"https://w3id.org/did/v1\",\
             \"authentication\":[{\"publicKey\":\"did:sov:LjgpST2rjsoxYegQDRm7EL#1\",\
             \"type\":\"Ed25519SignatureAuthentication2018\"}],\
             \"id\":\"did:sov:LjgpST2rjsoxYegQDRm7EL\",\
             \"publicKey\":[{\"controller\":\"did:sov:LjgpST2rjsoxYegQDRm7EL\",\
             \"id\":\"did:sov:LjgpST2rjsoxYegQDRm7EL#1\",\
             \"publicKeyBase58\":\"8HH5gYEeNc3z7PYXmd54d4x6qAfCNrqQqEB3nS7Zfu7K\",\
             \"type\":\"Ed25519VerificationKey2018\"}],\
             \"service\":[{\"id\":\"did:sov:LjgpST2rjsoxYegQDRm7EL;indy\",\
             \"recipientKeys\":[\"8HH5gYEeNc3z7PYXmd54d4x6qAfCNrqQqEB3nS7Zfu7K\"],\
             \"serviceEndpoint\":\"https://agent.example.com\",\
             \"type\":\"IndyAgent\"}]}"
        );
    }

    #[test]
    fn json_round_trip_preserves_keys_and_services() {
        let doc = sample_doc();
        let parsed = DidDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(parsed, doc);
        assert!(parsed.public_keys().next().unwrap().authn);
        assert_eq!(
            parsed.first_service().unwrap().id,
            format!("{DID};indy")
        );
    }

    #[test]
    fn routing_keys_survive_round_trip() {
        let mut doc = sample_doc();
        doc.set_public_key(PublicKey::new(
            DID,
            "routing-1",
            ED25519_VERIFICATION_KEY_2018,
            DID,
            "6zk5cCkhhDMKnQbamAqAEEaZpF73NxtDBALy6eGbWkej",
            true,
        ));
        doc.set_service(Service::new(
            DID,
            "indy",
            SERVICE_TYPE_INDY_AGENT,
            vec![VERKEY.to_owned()],
            vec!["6zk5cCkhhDMKnQbamAqAEEaZpF73NxtDBALy6eGbWkej".to_owned()],
            "https://router.example.com",
        ));

        let parsed = DidDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(parsed, doc);
        assert_eq!(parsed.public_keys().count(), 2);
        assert_eq!(
            parsed.first_service().unwrap().routing_keys,
            vec!["6zk5cCkhhDMKnQbamAqAEEaZpF73NxtDBALy6eGbWkej".to_owned()]
        );
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            DidDocument::from_json("{\"id\":3}"),
            Err(DidDocError::Malformed(_))
        ));
    }
}
