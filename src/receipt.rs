/// Ambient context of one inbound message.
///
/// Transport hands over the verkeys it unpacked the message with; the inbound
/// resolver returns a copy annotated with the DIDs they map to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageReceipt {
    pub sender_verkey: Option<String>,
    pub recipient_verkey: Option<String>,
    pub sender_did: Option<String>,
    pub recipient_did: Option<String>,
    pub recipient_did_public: bool,
}

impl MessageReceipt {
    pub fn new(sender_verkey: Option<String>, recipient_verkey: Option<String>) -> Self {
        Self {
            sender_verkey,
            recipient_verkey,
            ..Default::default()
        }
    }
}
