use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{qualify, Thread, DIDEX_COMPLETE};

/// The exchange-complete acknowledgement. Carries nothing beyond thread
/// correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeComplete {
    #[serde(rename = "@type")]
    pub message_type: String,
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "~thread", skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,
}

impl ExchangeComplete {
    pub fn new() -> Self {
        Self {
            message_type: qualify(DIDEX_COMPLETE),
            id: Uuid::new_v4().to_string(),
            thread: None,
        }
    }

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

impl Default for ExchangeComplete {
    fn default() -> Self {
        Self::new()
    }
}
