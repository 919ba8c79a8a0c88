use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::traits::{Wallet, WalletError};

/// A payload carried inside a protocol message together with a detached
/// signature over its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "mime-type")]
    pub mime_type: String,
    pub data: AttachmentData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentData {
    /// Base64 of the payload bytes.
    pub base64: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jws: Option<SignatureEnvelope>,
}

/// Detached signature and the verkey that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEnvelope {
    /// Base64url (unpadded) signature bytes.
    pub signature: String,
    pub signer: String,
}

impl Attachment {
    /// Wraps raw payload bytes as an unsigned JSON attachment.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            mime_type: "application/json".to_owned(),
            data: AttachmentData {
                base64: STANDARD.encode(bytes),
                jws: None,
            },
        }
    }

    /// The payload bytes the signature covers.
    pub fn content_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        if self.data.base64.is_empty() {
            return Err(ProtocolError::MissingAttachment);
        }
        STANDARD
            .decode(&self.data.base64)
            .map_err(|_| ProtocolError::MissingAttachment)
    }

    pub fn is_signed(&self) -> bool {
        self.data.jws.is_some()
    }

    /// Signs the payload bytes with `verkey` and records the signer.
    pub async fn sign(&mut self, verkey: &str, wallet: &dyn Wallet) -> Result<(), WalletError> {
        let bytes = STANDARD
            .decode(&self.data.base64)
            .map_err(|e| WalletError::Internal(e.to_string()))?;
        let signature = wallet.sign(&bytes, verkey).await?;
        self.data.jws = Some(SignatureEnvelope {
            signature: URL_SAFE_NO_PAD.encode(signature),
            signer: verkey.to_owned(),
        });
        Ok(())
    }

    /// Verifies the detached signature against the recorded signer key.
    ///
    /// Returns `Ok(false)` on a well-formed but invalid signature; an
    /// unsigned or undecodable attachment is a [`ProtocolError`].
    pub async fn verify(&self, wallet: &dyn Wallet) -> Result<bool, crate::error::ExchangeError> {
        let jws = self
            .data
            .jws
            .as_ref()
            .ok_or(ProtocolError::MissingAttachment)?;
        let bytes = self.content_bytes()?;
        let signature = URL_SAFE_NO_PAD
            .decode(&jws.signature)
            .map_err(|_| ProtocolError::SignatureInvalid)?;
        Ok(wallet.verify(&bytes, &signature, &jws.signer).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExchangeError;
    use crate::testing::MockWallet;
    use crate::traits::Wallet;

    #[tokio::test]
    async fn sign_then_verify() {
        let wallet = MockWallet::new();
        let key = wallet.create_signing_key().await.unwrap();

        let mut attach = Attachment::from_bytes(b"{\"id\":\"did:sov:test\"}");
        assert!(!attach.is_signed());
        attach.sign(&key.verkey, &wallet).await.unwrap();
        assert!(attach.is_signed());
        assert!(attach.verify(&wallet).await.unwrap());
        assert_eq!(attach.content_bytes().unwrap(), b"{\"id\":\"did:sov:test\"}");
    }

    #[tokio::test]
    async fn verification_fails_on_payload_swap() {
        let wallet = MockWallet::new();
        let key = wallet.create_signing_key().await.unwrap();

        let mut attach = Attachment::from_bytes(b"original");
        attach.sign(&key.verkey, &wallet).await.unwrap();

        let mut forged = Attachment::from_bytes(b"forged");
        forged.data.jws = attach.data.jws.clone();
        assert!(!forged.verify(&wallet).await.unwrap());
    }

    #[tokio::test]
    async fn unsigned_attachment_is_a_protocol_error() {
        let wallet = MockWallet::new();
        let attach = Attachment::from_bytes(b"payload");
        let err = attach.verify(&wallet).await.unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Protocol(ProtocolError::MissingAttachment)
        ));
    }
}
