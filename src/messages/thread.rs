use serde::{Deserialize, Serialize};

/// The `~thread` decorator correlating protocol messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pthid: Option<String>,
}

impl Thread {
    pub fn new(thid: impl Into<String>, pthid: Option<String>) -> Self {
        Self {
            thid: Some(thid.into()),
            pthid,
        }
    }

    /// Thread context for a reply to a message with the given decorator and
    /// `@id`: the thread id carries over, falling back to the message id.
    pub fn from_message(thread: Option<&Thread>, message_id: &str) -> Self {
        Self {
            thid: Some(
                thread
                    .and_then(|t| t.thid.clone())
                    .unwrap_or_else(|| message_id.to_owned()),
            ),
            pthid: thread.and_then(|t| t.pthid.clone()),
        }
    }
}
