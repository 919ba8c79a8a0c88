use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{qualify, Attachment, Thread, DIDEX_RESPONSE};

/// The exchange response: the responder's DID plus a DID Document signed with
/// the invitation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeResponse {
    #[serde(rename = "@type")]
    pub message_type: String,
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "~thread", skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,
    pub did: String,
    #[serde(rename = "did_doc~attach", skip_serializing_if = "Option::is_none")]
    pub did_doc_attach: Option<Attachment>,
}

impl ExchangeResponse {
    pub fn new(did: String, did_doc_attach: Attachment) -> Self {
        Self {
            message_type: qualify(DIDEX_RESPONSE),
            id: Uuid::new_v4().to_string(),
            thread: None,
            did,
            did_doc_attach: Some(did_doc_attach),
        }
    }

    /// Copies thread correlation from the message being answered.
    pub fn assign_thread_from(&mut self, thread: Option<&Thread>, message_id: &str) {
        self.thread = Some(Thread::from_message(thread, message_id));
    }

    pub fn thread_id(&self) -> &str {
        self.thread
            .as_ref()
            .and_then(|t| t.thid.as_deref())
            .unwrap_or(&self.id)
    }
}
