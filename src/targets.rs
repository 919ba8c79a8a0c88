use serde::{Deserialize, Serialize};

/// One routable destination for outbound traffic on a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub recipient_keys: Vec<String>,
    pub routing_keys: Vec<String>,
    pub sender_key: String,
}
