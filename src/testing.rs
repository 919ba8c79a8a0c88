//! Mock collaborators for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use multibase::Base::Base58Btc;
use serde_json::Value;

use crate::error::RoutingError;
use crate::traits::{
    DidInfo, KeyInfo, Ledger, LedgerError, Responder, ResponderError, RouteManager, Wallet,
    WalletError,
};

fn generate_signing_key() -> Result<SigningKey, WalletError> {
    let mut seed = [0u8; 32];
    getrandom::getrandom(&mut seed).map_err(|e| WalletError::Internal(e.to_string()))?;
    Ok(SigningKey::from_bytes(&seed))
}

/// In-memory wallet with real Ed25519 signatures.
#[derive(Default)]
pub struct MockWallet {
    keys: DashMap<String, SigningKey>,
    dids: DashMap<String, DidInfo>,
    dids_by_verkey: DashMap<String, String>,
    public_did: Mutex<Option<String>>,
    verkey_lookups: AtomicUsize,
}

impl MockWallet {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_key(&self) -> Result<String, WalletError> {
        let signing_key = generate_signing_key()?;
        let verkey = Base58Btc.encode(signing_key.verifying_key().as_bytes());
        self.keys.insert(verkey.clone(), signing_key);
        Ok(verkey)
    }

    fn new_did(&self, public: bool) -> Result<DidInfo, WalletError> {
        let verkey = self.new_key()?;
        let raw = Base58Btc
            .decode(&verkey)
            .map_err(|e| WalletError::Internal(e.to_string()))?;
        let did = format!("did:sov:{}", Base58Btc.encode(&raw[..16]));
        let info = DidInfo {
            did: did.clone(),
            verkey: verkey.clone(),
            public,
        };
        self.dids.insert(did.clone(), info.clone());
        self.dids_by_verkey.insert(verkey, did);
        Ok(info)
    }

    /// Creates a DID marked public and registers it as the wallet's public
    /// DID.
    pub fn create_public_did(&self) -> Result<DidInfo, WalletError> {
        let info = self.new_did(true)?;
        *self.public_did.lock().unwrap() = Some(info.did.clone());
        Ok(info)
    }

    /// How many times `get_local_did_for_verkey` ran.
    pub fn verkey_lookups(&self) -> usize {
        self.verkey_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Wallet for MockWallet {
    async fn get_public_did(&self) -> Result<Option<DidInfo>, WalletError> {
        let did = self.public_did.lock().unwrap().clone();
        Ok(did.and_then(|did| self.dids.get(&did).map(|info| info.clone())))
    }

    async fn get_local_did(&self, did: &str) -> Result<DidInfo, WalletError> {
        self.dids
            .get(did)
            .map(|info| info.clone())
            .ok_or_else(|| WalletError::NotFound(did.to_owned()))
    }

    async fn get_local_did_for_verkey(&self, verkey: &str) -> Result<DidInfo, WalletError> {
        self.verkey_lookups.fetch_add(1, Ordering::SeqCst);
        let did = self
            .dids_by_verkey
            .get(verkey)
            .map(|did| did.clone())
            .ok_or_else(|| WalletError::NotFound(verkey.to_owned()))?;
        self.get_local_did(&did).await
    }

    async fn create_local_did(&self) -> Result<DidInfo, WalletError> {
        self.new_did(false)
    }

    async fn create_signing_key(&self) -> Result<KeyInfo, WalletError> {
        Ok(KeyInfo {
            verkey: self.new_key()?,
        })
    }

    async fn sign(&self, message: &[u8], verkey: &str) -> Result<Vec<u8>, WalletError> {
        let key = self
            .keys
            .get(verkey)
            .ok_or_else(|| WalletError::NotFound(verkey.to_owned()))?;
        Ok(key.sign(message).to_bytes().to_vec())
    }

    async fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        verkey: &str,
    ) -> Result<bool, WalletError> {
        let raw = Base58Btc
            .decode(verkey)
            .map_err(|_| WalletError::Internal(format!("bad verkey: {verkey}")))?;
        let raw: [u8; 32] = raw
            .try_into()
            .map_err(|_| WalletError::Internal(format!("bad verkey length: {verkey}")))?;
        let verifying_key = VerifyingKey::from_bytes(&raw)
            .map_err(|e| WalletError::Internal(e.to_string()))?;
        let Ok(signature) = Signature::from_slice(signature) else {
            return Ok(false);
        };
        Ok(verifying_key.verify(message, &signature).is_ok())
    }
}

/// Records every dispatched message instead of sending it.
#[derive(Default)]
pub struct MockResponder {
    sent: Mutex<Vec<(Value, String)>>,
}

impl MockResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains the recorded `(message, connection_id)` pairs.
    pub fn take_sent(&self) -> Vec<(Value, String)> {
        std::mem::take(&mut self.sent.lock().unwrap())
    }
}

#[async_trait]
impl Responder for MockResponder {
    async fn send_reply(&self, message: Value, connection_id: &str) -> Result<(), ResponderError> {
        self.sent
            .lock()
            .unwrap()
            .push((message, connection_id.to_owned()));
        Ok(())
    }

    async fn send(&self, message: Value, connection_id: &str) -> Result<(), ResponderError> {
        self.send_reply(message, connection_id).await
    }
}

/// Static ledger lookups.
#[derive(Default)]
pub struct MockLedger {
    pub endpoints: DashMap<String, String>,
    pub keys: DashMap<String, String>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn get_endpoint_for_did(&self, did: &str) -> Result<String, LedgerError> {
        self.endpoints
            .get(did)
            .map(|e| e.clone())
            .ok_or_else(|| LedgerError::NotFound(did.to_owned()))
    }

    async fn get_key_for_did(&self, did: &str) -> Result<String, LedgerError> {
        self.keys
            .get(did)
            .map(|k| k.clone())
            .ok_or_else(|| LedgerError::NotFound(did.to_owned()))
    }
}

/// Records create-route requests.
#[derive(Default)]
pub struct MockRouteManager {
    routes: Mutex<Vec<(String, String)>>,
}

impl MockRouteManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<(String, String)> {
        self.routes.lock().unwrap().clone()
    }
}

#[async_trait]
impl RouteManager for MockRouteManager {
    async fn send_create_route(
        &self,
        router_connection_id: &str,
        verkey: &str,
        _responder: &dyn Responder,
    ) -> Result<(), RoutingError> {
        self.routes
            .lock()
            .unwrap()
            .push((router_connection_id.to_owned(), verkey.to_owned()));
        Ok(())
    }
}
