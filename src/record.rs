//! The pairwise connection record and its persistence.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ExchangeError;
use crate::messages::{ExchangeRequest, OobInvitation};
use storage::{RecordStore, StorageError, StorageRecord};

pub const RECORD_TYPE_CONNECTION: &str = "connection";
pub const RECORD_TYPE_INVITATION: &str = "connection_invitation";
pub const RECORD_TYPE_REQUEST: &str = "connection_request";

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Invitation,
    Request,
    Response,
    Completed,
    Abandoned,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invitation => "invitation",
            Self::Request => "request",
            Self::Response => "response",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The counterparty's role in the exchange, from our viewpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Requester,
    Responder,
}

impl Role {
    /// The same relationship seen from the other side.
    pub fn flip(&self) -> Self {
        match self {
            Self::Requester => Self::Responder,
            Self::Responder => Self::Requester,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requester => "requester",
            Self::Responder => "responder",
        }
    }
}

/// Whether protocol progress requires an explicit local decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accept {
    Auto,
    Manual,
}

/// Whether an invitation may be answered more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationMode {
    Once,
    Multi,
}

/// Progress of the inbound-routing attachment, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingState {
    None,
    Request,
    Active,
    Error,
}

/// One pairwise connection, persisted as a `"connection"` record whose tags
/// mirror the queryable fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub connection_id: String,
    pub my_did: Option<String>,
    pub their_did: Option<String>,
    pub their_label: Option<String>,
    pub their_role: Role,
    /// The ephemeral verkey the originating invitation advertised.
    pub invitation_key: Option<String>,
    pub state: State,
    pub accept: Accept,
    pub invitation_mode: InvitationMode,
    pub alias: Option<String>,
    /// Thread id of the request we sent or received.
    pub request_id: Option<String>,
    /// Connection acting as our inbound mediator, if any.
    pub inbound_connection_id: Option<String>,
    pub routing_state: RoutingState,
}

impl ConnectionRecord {
    pub fn new(their_role: Role) -> Self {
        Self {
            connection_id: Uuid::new_v4().to_string(),
            my_did: None,
            their_did: None,
            their_label: None,
            their_role,
            invitation_key: None,
            state: State::Invitation,
            accept: Accept::Manual,
            invitation_mode: InvitationMode::Once,
            alias: None,
            request_id: None,
            inbound_connection_id: None,
            routing_state: RoutingState::None,
        }
    }

    pub fn is_multiuse(&self) -> bool {
        self.invitation_mode == InvitationMode::Multi
    }

    /// Whether the connection can carry traffic already.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Response | State::Completed)
    }

    fn tags(&self) -> HashMap<String, String> {
        let mut tags = HashMap::new();
        tags.insert("state".to_owned(), self.state.as_str().to_owned());
        tags.insert("their_role".to_owned(), self.their_role.as_str().to_owned());
        let optional = [
            ("my_did", &self.my_did),
            ("their_did", &self.their_did),
            ("invitation_key", &self.invitation_key),
            ("request_id", &self.request_id),
            ("inbound_connection_id", &self.inbound_connection_id),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                tags.insert(name.to_owned(), value.clone());
            }
        }
        tags
    }

    fn to_storage_record(&self) -> Result<StorageRecord, ExchangeError> {
        Ok(StorageRecord::with_id(
            RECORD_TYPE_CONNECTION,
            self.connection_id.clone(),
            serde_json::to_string(self)?,
            self.tags(),
        ))
    }

    fn from_storage_record(record: &StorageRecord) -> Result<Self, ExchangeError> {
        Ok(serde_json::from_str(&record.value)?)
    }

    /// Upserts the record; tags track the current field values.
    pub async fn save(&self, store: &dyn RecordStore) -> Result<(), ExchangeError> {
        let record = self.to_storage_record()?;
        let existing = store
            .get_record(RECORD_TYPE_CONNECTION, &self.connection_id)
            .await?;
        match existing {
            Some(_) => store.update_record(record).await?,
            None => store.add_record(record).await?,
        }
        tracing::debug!(
            connection_id = %self.connection_id,
            state = %self.state,
            "saved connection record"
        );
        Ok(())
    }

    pub async fn delete(&self, store: &dyn RecordStore) -> Result<(), ExchangeError> {
        store
            .delete_record(RECORD_TYPE_CONNECTION, &self.connection_id)
            .await?;
        Ok(())
    }

    pub async fn retrieve_by_id(
        store: &dyn RecordStore,
        connection_id: &str,
    ) -> Result<Self, ExchangeError> {
        let record = store
            .get_record(RECORD_TYPE_CONNECTION, connection_id)
            .await?
            .ok_or(StorageError::NotFound)?;
        Self::from_storage_record(&record)
    }

    /// Finds the record anchored on `invitation_key`, seen from `my_role`.
    pub async fn find_by_invitation_key(
        store: &dyn RecordStore,
        invitation_key: &str,
        my_role: Role,
    ) -> Result<Option<Self>, ExchangeError> {
        // Records store the counterparty's role; flip ours to match.
        let query = HashMap::from([
            ("invitation_key".to_owned(), invitation_key.to_owned()),
            ("their_role".to_owned(), my_role.flip().as_str().to_owned()),
        ]);
        store
            .find_one(RECORD_TYPE_CONNECTION, &query)
            .await?
            .as_ref()
            .map(Self::from_storage_record)
            .transpose()
    }

    pub async fn find_by_request_id(
        store: &dyn RecordStore,
        request_id: &str,
    ) -> Result<Option<Self>, ExchangeError> {
        let query = HashMap::from([("request_id".to_owned(), request_id.to_owned())]);
        store
            .find_one(RECORD_TYPE_CONNECTION, &query)
            .await?
            .as_ref()
            .map(Self::from_storage_record)
            .transpose()
    }

    /// Finds the record for a DID pair; `my_did` and `my_role` narrow the
    /// match when supplied.
    pub async fn find_by_did_pair(
        store: &dyn RecordStore,
        their_did: &str,
        my_did: Option<&str>,
        my_role: Option<Role>,
    ) -> Result<Option<Self>, ExchangeError> {
        let mut query = HashMap::from([("their_did".to_owned(), their_did.to_owned())]);
        if let Some(my_did) = my_did {
            query.insert("my_did".to_owned(), my_did.to_owned());
        }
        if let Some(my_role) = my_role {
            query.insert("their_role".to_owned(), my_role.flip().as_str().to_owned());
        }
        store
            .find_one(RECORD_TYPE_CONNECTION, &query)
            .await?
            .as_ref()
            .map(Self::from_storage_record)
            .transpose()
    }

    /// All records that route inbound traffic through the given connection.
    pub async fn query_by_inbound_connection(
        store: &dyn RecordStore,
        inbound_connection_id: &str,
    ) -> Result<Vec<Self>, ExchangeError> {
        let query = HashMap::from([(
            "inbound_connection_id".to_owned(),
            inbound_connection_id.to_owned(),
        )]);
        store
            .find_all(RECORD_TYPE_CONNECTION, &query)
            .await?
            .iter()
            .map(Self::from_storage_record)
            .collect()
    }

    /// Keeps the original invitation alongside the record.
    pub async fn attach_invitation(
        &self,
        store: &dyn RecordStore,
        invitation: &OobInvitation,
    ) -> Result<(), ExchangeError> {
        let tags = HashMap::from([("connection_id".to_owned(), self.connection_id.clone())]);
        store
            .add_record(StorageRecord::new(
                RECORD_TYPE_INVITATION,
                serde_json::to_string(invitation)?,
                tags,
            ))
            .await?;
        Ok(())
    }

    pub async fn retrieve_invitation(
        &self,
        store: &dyn RecordStore,
    ) -> Result<OobInvitation, ExchangeError> {
        let query = HashMap::from([("connection_id".to_owned(), self.connection_id.clone())]);
        let record = store
            .find_one(RECORD_TYPE_INVITATION, &query)
            .await?
            .ok_or(StorageError::NotFound)?;
        Ok(serde_json::from_str(&record.value)?)
    }

    /// Keeps the original request alongside the record.
    pub async fn attach_request(
        &self,
        store: &dyn RecordStore,
        request: &ExchangeRequest,
    ) -> Result<(), ExchangeError> {
        let tags = HashMap::from([("connection_id".to_owned(), self.connection_id.clone())]);
        store
            .add_record(StorageRecord::new(
                RECORD_TYPE_REQUEST,
                serde_json::to_string(request)?,
                tags,
            ))
            .await?;
        Ok(())
    }

    pub async fn retrieve_request(
        &self,
        store: &dyn RecordStore,
    ) -> Result<ExchangeRequest, ExchangeError> {
        let query = HashMap::from([("connection_id".to_owned(), self.connection_id.clone())]);
        let record = store
            .find_one(RECORD_TYPE_REQUEST, &query)
            .await?
            .ok_or(StorageError::NotFound)?;
        Ok(serde_json::from_str(&record.value)?)
    }
}
