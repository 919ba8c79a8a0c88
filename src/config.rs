use std::time::Duration;

/// Agent-level settings, fixed at construction.
#[derive(Debug, Clone)]
pub struct Config {
    /// Label advertised in invitations and requests.
    pub label: Option<String>,
    /// Default service endpoint for documents and invitations.
    pub endpoint: Option<String>,
    /// Extra endpoints advertised alongside the default one.
    pub additional_endpoints: Vec<String>,
    /// Whether invitations anchored on the public DID may be created, and
    /// whether requests against the public DID are accepted.
    pub public_invites: bool,
    /// Auto-respond to received invitations with a request.
    pub auto_accept_invites: bool,
    /// Auto-respond to received requests with a response.
    pub auto_accept_requests: bool,
    /// Lifetime of inbound-resolution and connection-target cache entries.
    pub cache_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            label: None,
            endpoint: None,
            additional_endpoints: vec![],
            public_invites: false,
            auto_accept_invites: false,
            auto_accept_requests: false,
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

impl Config {
    /// Endpoints to advertise: the explicit override, or the configured
    /// default plus any additional endpoints.
    pub(crate) fn resolve_endpoints(&self, endpoint: Option<&str>) -> Vec<String> {
        match endpoint {
            Some(endpoint) => vec![endpoint.to_owned()],
            None => self
                .endpoint
                .iter()
                .chain(self.additional_endpoints.iter())
                .cloned()
                .collect(),
        }
    }
}
