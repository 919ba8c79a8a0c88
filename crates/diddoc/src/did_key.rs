//! Conversion between naked base58 verkeys and `did:key` identifiers.

use multibase::Base::Base58Btc;

use crate::DidDocError;

// Multicodec prefix for Ed25519 public keys.
const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

/// Encodes a base58 verkey as a `did:key` identifier.
pub fn verkey_to_did_key(verkey: &str) -> Result<String, DidDocError> {
    let raw = Base58Btc
        .decode(verkey)
        .map_err(|_| DidDocError::InvalidVerkey(verkey.to_owned()))?;
    let mut prefixed = Vec::with_capacity(raw.len() + ED25519_MULTICODEC.len());
    prefixed.extend_from_slice(&ED25519_MULTICODEC);
    prefixed.extend_from_slice(&raw);
    Ok(format!(
        "did:key:{}",
        multibase::encode(Base58Btc, prefixed)
    ))
}

/// Decodes a `did:key` identifier back to its naked base58 verkey.
pub fn did_key_to_verkey(did_key: &str) -> Result<String, DidDocError> {
    let fingerprint = did_key
        .strip_prefix("did:key:")
        .ok_or_else(|| DidDocError::InvalidDidKey(did_key.to_owned()))?;
    // A did:key may carry a same-key fragment; the fingerprint is what counts.
    let fingerprint = fingerprint.split('#').next().unwrap_or(fingerprint);
    let (_, bytes) = multibase::decode(fingerprint)
        .map_err(|_| DidDocError::InvalidDidKey(did_key.to_owned()))?;
    let raw = bytes
        .strip_prefix(&ED25519_MULTICODEC[..])
        .ok_or_else(|| DidDocError::InvalidDidKey(did_key.to_owned()))?;
    Ok(Base58Btc.encode(raw))
}

/// Accepts either a naked verkey or a `did:key` identifier and returns the
/// naked verkey.
pub fn normalize_verkey(key: &str) -> Result<String, DidDocError> {
    if key.starts_with("did:key:") {
        did_key_to_verkey(key)
    } else {
        Ok(key.to_owned())
    }
}
