//! Request / response / complete transitions of the exchange.

use diddoc::{DidDocError, DidDocument};

use super::ExchangeManager;
use crate::error::{ConfigError, ExchangeError, ProtocolError};
use crate::messages::{Attachment, ExchangeComplete, ExchangeRequest, ExchangeResponse, Thread};
use crate::receipt::MessageReceipt;
use crate::record::{Accept, ConnectionRecord, Role, State};

impl ExchangeManager {
    /// Builds and persists the request answering a received invitation.
    pub async fn create_request(
        &self,
        connection: &mut ConnectionRecord,
        label: Option<&str>,
        endpoint: Option<&str>,
    ) -> Result<ExchangeRequest, ExchangeError> {
        let my_info = match &connection.my_did {
            Some(did) => self.wallet().get_local_did(did).await?,
            None => {
                let info = self.wallet().create_local_did().await?;
                connection.my_did = Some(info.did.clone());
                info
            }
        };

        let endpoints = self.config().resolve_endpoints(endpoint);
        let doc = self
            .build_did_document(&my_info, connection.inbound_connection_id.as_deref(), &endpoints)
            .await?;
        let pthid = doc.first_service().map(|s| s.id.clone());

        let mut attach = Attachment::from_bytes(&doc.canonical_bytes()?);
        attach.sign(&my_info.verkey, self.wallet()).await?;

        let label = label.map(str::to_owned).or_else(|| self.config().label.clone());
        let mut request = ExchangeRequest::new(label, my_info.did, attach);
        request.thread = Some(Thread::new(request.id.clone(), pthid));

        connection.request_id = Some(request.id.clone());
        connection.state = State::Request;
        connection.save(self.store()).await?;
        tracing::info!(
            connection_id = %connection.connection_id,
            "created connection request"
        );

        Ok(request)
    }

    /// Accepts an inbound request against one of our invitations (or our
    /// public DID) and, under auto-accept, dispatches the response.
    pub async fn receive_request(
        &self,
        request: ExchangeRequest,
        receipt: &MessageReceipt,
    ) -> Result<ConnectionRecord, ExchangeError> {
        tracing::debug!(request_id = %request.id, "receiving connection request");

        let mut connection: Option<ConnectionRecord> = None;

        // Determine which key must sign our response.
        let mut connection_key = if receipt.recipient_did_public {
            let my_info = match receipt.recipient_did.as_deref() {
                Some(did) => self.wallet().get_local_did(did).await?,
                None => return Err(ProtocolError::InvitationNotFound.into()),
            };
            my_info.verkey
        } else {
            let recipient_verkey = receipt
                .recipient_verkey
                .clone()
                .ok_or(ProtocolError::InvitationNotFound)?;
            connection =
                ConnectionRecord::find_by_invitation_key(self.store(), &recipient_verkey, Role::Responder)
                    .await?;
            if connection.is_none() {
                return Err(ProtocolError::InvitationNotFound.into());
            }
            recipient_verkey
        };

        if let Some(found) = connection.take() {
            if let Some(key) = &found.invitation_key {
                connection_key = key.clone();
            }
            tracing::debug!(connection_id = %found.connection_id, "found invitation");

            if found.is_multiuse() {
                // Never advance a multi-use invitation; spawn a child record.
                let my_info = self.wallet().create_local_did().await?;
                let mut child = ConnectionRecord::new(found.their_role);
                child.invitation_key = Some(connection_key.clone());
                child.my_did = Some(my_info.did);
                child.state = State::Request;
                child.accept = found.accept;
                child.save(self.store()).await?;
                tracing::info!(
                    connection_id = %child.connection_id,
                    "received connection request from multi-use invitation"
                );
                connection = Some(child);
            } else {
                connection = Some(found);
            }
        }

        let doc = self
            .verify_signed_attachment(request.did_doc_attach.as_ref())
            .await?;
        if request.did != doc.did() {
            return Err(ProtocolError::DidMismatch {
                did: request.did.clone(),
                doc_did: doc.did().to_owned(),
            }
            .into());
        }
        self.store_did_document(&doc).await?;

        let mut connection = match connection {
            Some(mut connection) => {
                if connection.my_did.is_none() {
                    let my_info = self.wallet().create_local_did().await?;
                    connection.my_did = Some(my_info.did);
                }
                connection.their_label = request.label.clone();
                connection.their_did = Some(request.did.clone());
                connection.request_id = Some(request.thread_id().to_owned());
                connection.state = State::Request;
                connection.save(self.store()).await?;
                connection
            }
            None => {
                if !self.config().public_invites {
                    return Err(ConfigError::PublicInvitesDisabled.into());
                }
                let my_info = self.wallet().create_local_did().await?;
                let mut connection = ConnectionRecord::new(Role::Requester);
                connection.invitation_key = Some(connection_key);
                connection.my_did = Some(my_info.did);
                connection.their_did = Some(request.did.clone());
                connection.their_label = request.label.clone();
                connection.request_id = Some(request.thread_id().to_owned());
                connection.state = State::Request;
                if self.config().auto_accept_requests {
                    connection.accept = Accept::Auto;
                }
                connection.save(self.store()).await?;
                tracing::info!(
                    connection_id = %connection.connection_id,
                    "received connection request against public DID"
                );
                connection
            }
        };

        // Keep the request around so the response can be built later.
        connection.attach_request(self.store(), &request).await?;

        if connection.accept == Accept::Auto {
            let response = self.create_response(&mut connection, None).await?;
            self.send_reply(&response, &connection.connection_id).await?;
        } else {
            tracing::debug!("connection request will await acceptance");
        }

        Ok(connection)
    }

    /// Builds and persists the response to a stored request.
    pub async fn create_response(
        &self,
        connection: &mut ConnectionRecord,
        endpoint: Option<&str>,
    ) -> Result<ExchangeResponse, ExchangeError> {
        tracing::debug!(
            connection_id = %connection.connection_id,
            "creating connection response"
        );
        if connection.state != State::Request {
            return Err(ProtocolError::WrongState(connection.state).into());
        }

        let request = connection.retrieve_request(self.store()).await?;
        let my_info = match &connection.my_did {
            Some(did) => self.wallet().get_local_did(did).await?,
            None => {
                let info = self.wallet().create_local_did().await?;
                connection.my_did = Some(info.did.clone());
                info
            }
        };

        let endpoints = self.config().resolve_endpoints(endpoint);
        let doc = self
            .build_did_document(&my_info, connection.inbound_connection_id.as_deref(), &endpoints)
            .await?;

        let mut attach = Attachment::from_bytes(&doc.canonical_bytes()?);
        // Signed with the invitation key: proof we control the invitation
        // this request answered.
        let invitation_key = connection
            .invitation_key
            .clone()
            .ok_or(ProtocolError::InvitationNotFound)?;
        attach.sign(&invitation_key, self.wallet()).await?;

        let mut response = ExchangeResponse::new(my_info.did, attach);
        response.assign_thread_from(request.thread.as_ref(), &request.id);

        connection.state = State::Response;
        connection.save(self.store()).await?;

        Ok(response)
    }

    /// Processes the peer's response to our request and dispatches the
    /// closing complete message.
    pub async fn accept_response(
        &self,
        response: ExchangeResponse,
        receipt: &MessageReceipt,
    ) -> Result<ConnectionRecord, ExchangeError> {
        let mut connection = match response.thread.as_ref().and_then(|t| t.thid.as_deref()) {
            Some(thid) => ConnectionRecord::find_by_request_id(self.store(), thid).await?,
            None => None,
        };
        if connection.is_none() {
            if let Some(sender_did) = receipt.sender_did.as_deref() {
                connection = ConnectionRecord::find_by_did_pair(
                    self.store(),
                    sender_did,
                    receipt.recipient_did.as_deref(),
                    Some(Role::Requester),
                )
                .await?;
            }
        }
        let mut connection = connection.ok_or(ProtocolError::UnmatchedResponse)?;

        if connection.state != State::Request {
            return Err(ProtocolError::WrongState(connection.state).into());
        }

        let doc = self
            .verify_signed_attachment(response.did_doc_attach.as_ref())
            .await?;
        if response.did != doc.did() {
            return Err(ProtocolError::DidMismatch {
                did: response.did.clone(),
                doc_did: doc.did().to_owned(),
            }
            .into());
        }
        self.store_did_document(&doc).await?;

        connection.their_did = Some(response.did.clone());
        connection.state = State::Response;
        connection.save(self.store()).await?;
        tracing::info!(
            connection_id = %connection.connection_id,
            "accepted connection response"
        );

        let mut complete = ExchangeComplete::new();
        complete.assign_thread_from(response.thread.as_ref(), &response.id);
        if self.send_reply(&complete, &connection.connection_id).await? {
            connection.state = State::Completed;
            connection.save(self.store()).await?;
        }

        Ok(connection)
    }

    /// Processes the peer's complete message, closing the exchange.
    pub async fn accept_complete(
        &self,
        complete: ExchangeComplete,
        _receipt: &MessageReceipt,
    ) -> Result<ConnectionRecord, ExchangeError> {
        let mut connection =
            ConnectionRecord::find_by_request_id(self.store(), complete.thread_id())
                .await?
                .ok_or(ProtocolError::CompleteNotAccepted)?;

        connection.state = State::Completed;
        connection.save(self.store()).await?;
        tracing::info!(
            connection_id = %connection.connection_id,
            "received connection complete"
        );

        Ok(connection)
    }

    /// Verifies a signed DID Document attachment and returns the document.
    pub async fn verify_signed_attachment(
        &self,
        attachment: Option<&Attachment>,
    ) -> Result<DidDocument, ExchangeError> {
        let attachment = attachment.ok_or(ProtocolError::MissingAttachment)?;
        let bytes = attachment.content_bytes()?;
        if !attachment.verify(self.wallet()).await? {
            return Err(ProtocolError::SignatureInvalid.into());
        }
        let json =
            String::from_utf8(bytes).map_err(|e| DidDocError::Malformed(e.to_string()))?;
        Ok(DidDocument::from_json(&json)?)
    }
}
