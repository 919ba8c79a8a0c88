use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{qualify, Attachment, Thread, DIDEX_REQUEST};

/// The exchange request: our DID plus our signed DID Document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRequest {
    #[serde(rename = "@type")]
    pub message_type: String,
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "~thread", skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub did: String,
    #[serde(rename = "did_doc~attach", skip_serializing_if = "Option::is_none")]
    pub did_doc_attach: Option<Attachment>,
}

impl ExchangeRequest {
    pub fn new(label: Option<String>, did: String, did_doc_attach: Attachment) -> Self {
        Self {
            message_type: qualify(DIDEX_REQUEST),
            id: Uuid::new_v4().to_string(),
            thread: None,
            label,
            did,
            did_doc_attach: Some(did_doc_attach),
        }
    }

    /// The id this message threads under: its `~thread.thid`, else its `@id`.
    pub fn thread_id(&self) -> &str {
        self.thread
            .as_ref()
            .and_then(|t| t.thid.as_deref())
            .unwrap_or(&self.id)
    }
}
