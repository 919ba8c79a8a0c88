use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{qualify, OOB_INVITATION};

/// An out-of-band invitation: the first-contact advertisement of keys and
/// endpoints, delivered over any channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OobInvitation {
    #[serde(rename = "@type")]
    pub message_type: String,
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handshake_protocols: Option<Vec<String>>,
    pub service: Vec<ServiceEntry>,
}

/// A service entry is either a resolvable DID or an inline block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceEntry {
    Did(String),
    Inline(OobService),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OobService {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipient_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routing_keys: Vec<String>,
    pub service_endpoint: String,
}

impl OobInvitation {
    pub fn new(
        label: Option<String>,
        handshake_protocols: Option<Vec<String>>,
        service: Vec<ServiceEntry>,
    ) -> Self {
        Self {
            message_type: qualify(OOB_INVITATION),
            id: Uuid::new_v4().to_string(),
            label,
            handshake_protocols,
            service,
        }
    }

    /// Service entries that are bare DIDs.
    pub fn service_dids(&self) -> Vec<&str> {
        self.service
            .iter()
            .filter_map(|entry| match entry {
                ServiceEntry::Did(did) => Some(did.as_str()),
                ServiceEntry::Inline(_) => None,
            })
            .collect()
    }

    /// Service entries carried inline.
    pub fn service_blocks(&self) -> Vec<&OobService> {
        self.service
            .iter()
            .filter_map(|entry| match entry {
                ServiceEntry::Did(_) => None,
                ServiceEntry::Inline(block) => Some(block),
            })
            .collect()
    }

    /// The anchoring DID of a public invitation, if present.
    pub fn did(&self) -> Option<&str> {
        self.service_dids().first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_entries_deserialize_as_dids_or_blocks() {
        let json = r##"{
            "@type": "https://didcomm.org/out-of-band/1.0/invitation",
            "@id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
            "label": "Alice",
            "service": [
                "did:sov:LjgpST2rjsoxYegQDRm7EL",
                {
                    "id": "#inline",
                    "type": "did-communication",
                    "recipientKeys": ["did:key:z6MkmjY8GnV5i9YTDtPETC2uUAW6ejw3nk5mXF5yci5ab7th"],
                    "serviceEndpoint": "https://agent.example.com"
                }
            ]
        }"##;

        let invitation: OobInvitation = serde_json::from_str(json).unwrap();
        assert_eq!(invitation.service_dids(), vec!["did:sov:LjgpST2rjsoxYegQDRm7EL"]);
        let blocks = invitation.service_blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].service_endpoint, "https://agent.example.com");
        assert_eq!(invitation.did(), Some("did:sov:LjgpST2rjsoxYegQDRm7EL"));

        let round_trip: OobInvitation =
            serde_json::from_str(&serde_json::to_string(&invitation).unwrap()).unwrap();
        assert_eq!(round_trip, invitation);
    }
}
