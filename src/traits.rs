//! Collaborator contracts consumed by the connection manager.
//!
//! Every external subsystem the manager touches is a trait object so agents
//! can plug in their own wallet, dispatcher, ledger client and cache.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::error::RoutingError;

/// A DID held in the wallet, with its current verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DidInfo {
    pub did: String,
    pub verkey: String,
    /// Whether the DID is published (anchored on the ledger).
    pub public: bool,
}

/// A bare signing key held in the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub verkey: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("wallet record not found: {0}")]
    NotFound(String),
    #[error("wallet failure: {0}")]
    Internal(String),
}

/// Key custody: DIDs, signing keys, and raw sign/verify.
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn get_public_did(&self) -> Result<Option<DidInfo>, WalletError>;

    async fn get_local_did(&self, did: &str) -> Result<DidInfo, WalletError>;

    async fn get_local_did_for_verkey(&self, verkey: &str) -> Result<DidInfo, WalletError>;

    async fn create_local_did(&self) -> Result<DidInfo, WalletError>;

    async fn create_signing_key(&self) -> Result<KeyInfo, WalletError>;

    async fn sign(&self, message: &[u8], verkey: &str) -> Result<Vec<u8>, WalletError>;

    async fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        verkey: &str,
    ) -> Result<bool, WalletError>;
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("outbound dispatch failed: {0}")]
pub struct ResponderError(pub String);

/// Outbound message dispatcher.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Sends a reply correlated to traffic on an existing connection.
    async fn send_reply(&self, message: Value, connection_id: &str) -> Result<(), ResponderError>;

    /// Sends an arbitrary message over a connection.
    async fn send(&self, message: Value, connection_id: &str) -> Result<(), ResponderError>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("no ledger configured")]
    Unavailable,
    #[error("ledger object not found: {0}")]
    NotFound(String),
    #[error("ledger failure: {0}")]
    Internal(String),
}

/// Read access to the verifiable data registry.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn get_endpoint_for_did(&self, did: &str) -> Result<String, LedgerError>;

    async fn get_key_for_did(&self, did: &str) -> Result<String, LedgerError>;
}

/// Key-value cache with per-key cooperative locking.
///
/// [`Cache::acquire`] admits one holder per key at a time; concurrent callers
/// suspend until the current handle is dropped. This is the single-flight
/// primitive the inbound resolver relies on.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn acquire(&self, key: &str) -> Box<dyn CacheHandle>;
}

/// Scoped view of one cache entry; dropping the handle releases the key.
#[async_trait]
pub trait CacheHandle: Send {
    /// The entry's current value, if present and not expired.
    fn result(&self) -> Option<Value>;

    async fn set_result(&mut self, value: Value, ttl: Duration);
}

/// Coordination protocol client toward an inbound router.
#[async_trait]
pub trait RouteManager: Send + Sync {
    /// Requests the router to forward traffic for `verkey` to us, dispatching
    /// through the given responder.
    async fn send_create_route(
        &self,
        router_connection_id: &str,
        verkey: &str,
        responder: &dyn Responder,
    ) -> Result<(), RoutingError>;
}
