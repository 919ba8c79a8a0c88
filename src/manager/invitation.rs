//! Invitation creation and receipt.

use diddoc::did_key::{normalize_verkey, verkey_to_did_key};

use super::ExchangeManager;
use crate::error::{ConfigError, ExchangeError, ProtocolError};
use crate::messages::{
    qualify, OobInvitation, OobService, ServiceEntry, DIDEX_INVITATION,
    SERVICE_TYPE_DID_COMMUNICATION,
};
use crate::record::{Accept, ConnectionRecord, InvitationMode, Role};

/// Options for [`ExchangeManager::create_invitation`].
#[derive(Debug, Clone, Default)]
pub struct InvitationOptions {
    pub label: Option<String>,
    pub endpoint: Option<String>,
    /// Overrides the configured auto-accept policy for this invitation.
    pub auto_accept: Option<bool>,
    /// Anchor the invitation on our public DID instead of an ephemeral key.
    pub public: bool,
    pub multi_use: bool,
    pub alias: Option<String>,
    pub include_handshake: bool,
}

impl ExchangeManager {
    /// Generates a new out-of-band invitation.
    ///
    /// Public invitations carry only the public DID and create no record; the
    /// DID itself is the stable anchor. Ephemeral invitations mint a fresh
    /// signing key and persist a record keyed by it.
    pub async fn create_invitation(
        &self,
        options: InvitationOptions,
    ) -> Result<(Option<ConnectionRecord>, OobInvitation), ExchangeError> {
        let label = options.label.or_else(|| self.config().label.clone());
        let handshake_protocols = options
            .include_handshake
            .then(|| vec![qualify(DIDEX_INVITATION)]);

        if options.public {
            if !self.config().public_invites {
                return Err(ConfigError::PublicInvitesDisabled.into());
            }
            let public_did = self
                .wallet()
                .get_public_did()
                .await?
                .ok_or(ConfigError::NoPublicDid)?;
            if options.multi_use {
                return Err(ConfigError::MultiUseWithPublic.into());
            }

            let invitation = OobInvitation::new(
                label,
                handshake_protocols,
                vec![ServiceEntry::Did(public_did.did)],
            );
            return Ok((None, invitation));
        }

        let invitation_mode = if options.multi_use {
            InvitationMode::Multi
        } else {
            InvitationMode::Once
        };
        let endpoint = options
            .endpoint
            .or_else(|| self.config().endpoint.clone())
            .unwrap_or_default();
        let accept = if options
            .auto_accept
            .unwrap_or(self.config().auto_accept_requests)
        {
            Accept::Auto
        } else {
            Accept::Manual
        };

        // Fresh invitation key; the peer's request must come back to it.
        let connection_key = self.wallet().create_signing_key().await?;

        let invitation = OobInvitation::new(
            label,
            handshake_protocols,
            vec![ServiceEntry::Inline(OobService {
                id: "#inline".to_owned(),
                service_type: SERVICE_TYPE_DID_COMMUNICATION.to_owned(),
                recipient_keys: vec![verkey_to_did_key(&connection_key.verkey)?],
                routing_keys: vec![],
                service_endpoint: endpoint,
            })],
        );

        let mut connection = ConnectionRecord::new(Role::Requester);
        connection.invitation_key = Some(connection_key.verkey);
        connection.accept = accept;
        connection.invitation_mode = invitation_mode;
        connection.alias = options.alias;

        connection.save(self.store()).await?;
        connection.attach_invitation(self.store(), &invitation).await?;
        tracing::info!(connection_id = %connection.connection_id, "created new invitation");

        Ok((Some(connection), invitation))
    }

    /// Tracks a received invitation and, under auto-accept, immediately sends
    /// the exchange request.
    pub async fn receive_invitation(
        &self,
        invitation: OobInvitation,
        auto_accept: Option<bool>,
        alias: Option<String>,
    ) -> Result<ConnectionRecord, ExchangeError> {
        let blocks = invitation.service_blocks();
        if invitation.service_dids().is_empty() {
            let blocks_usable = !blocks.is_empty()
                && blocks
                    .iter()
                    .all(|b| !b.recipient_keys.is_empty() && !b.service_endpoint.is_empty());
            if !blocks_usable {
                return Err(ProtocolError::MalformedInvitation.into());
            }
        }

        let accept = if auto_accept.unwrap_or(self.config().auto_accept_invites) {
            Accept::Auto
        } else {
            Accept::Manual
        };
        let invitation_key = blocks
            .first()
            .and_then(|b| b.recipient_keys.first())
            .map(|key| normalize_verkey(key))
            .transpose()?;

        let mut connection = ConnectionRecord::new(Role::Responder);
        connection.their_label = invitation.label.clone();
        connection.invitation_key = invitation_key;
        connection.accept = accept;
        connection.alias = alias;

        connection.save(self.store()).await?;
        connection.attach_invitation(self.store(), &invitation).await?;
        tracing::info!(
            connection_id = %connection.connection_id,
            "created connection record from invitation"
        );

        if connection.accept == Accept::Auto {
            let request = self.create_request(&mut connection, None, None).await?;
            self.send_reply(&request, &connection.connection_id).await?;
        } else {
            tracing::debug!("connection invitation will await acceptance");
        }

        Ok(connection)
    }
}
