//! Error taxonomy of the connection manager.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::State;
use crate::traits::{LedgerError, ResponderError, WalletError};
use storage::StorageError;

/// Machine-readable codes forwarded to the peer in a problem report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemReportCode {
    RequestNotAccepted,
    ResponseNotAccepted,
    CompleteNotAccepted,
}

impl ProblemReportCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestNotAccepted => "request_not_accepted",
            Self::ResponseNotAccepted => "response_not_accepted",
            Self::CompleteNotAccepted => "complete_not_accepted",
        }
    }
}

/// Invitation-creation preconditions derived from agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("public invitations are not enabled")]
    PublicInvitesDisabled,
    #[error("cannot create public invitation with no public DID")]
    NoPublicDid,
    #[error("cannot use public and multi-use at the same time")]
    MultiUseWithPublic,
}

/// Violations of the exchange protocol by the peer or by out-of-order calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("invitation must contain service blocks or service DIDs")]
    MalformedInvitation,
    #[error("DID document attachment missing, empty, or unsigned")]
    MissingAttachment,
    #[error("DID document attachment signature failed verification")]
    SignatureInvalid,
    #[error("connection DID {did} does not match DID document id {doc_did}")]
    DidMismatch { did: String, doc_did: String },
    #[error("operation not allowed in state {0}")]
    WrongState(State),
    #[error("no invitation found for pairwise connection")]
    InvitationNotFound,
    #[error("no corresponding connection request found")]
    UnmatchedResponse,
    #[error("no connection found for exchange-complete thread")]
    CompleteNotAccepted,
}

impl ProtocolError {
    /// The problem-report code a caller may forward to the peer, if any.
    pub fn problem_report_code(&self) -> Option<ProblemReportCode> {
        match self {
            Self::DidMismatch { .. } => Some(ProblemReportCode::RequestNotAccepted),
            Self::UnmatchedResponse => Some(ProblemReportCode::ResponseNotAccepted),
            Self::CompleteNotAccepted => Some(ProblemReportCode::CompleteNotAccepted),
            _ => None,
        }
    }
}

/// Failures while materializing or attaching an inbound routing chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("routing connection not found: {0}")]
    RouterNotFound(String),
    #[error("routing connection not ready: {0}")]
    RouterNotReady(String),
    #[error("routing connection misconfigured: {0}")]
    RouterMisconfigured(String),
}

/// Top-level error of every manager operation.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Responder(#[from] ResponderError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    DidDoc(#[from] diddoc::DidDocError),
    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ExchangeError {
    pub fn problem_report_code(&self) -> Option<ProblemReportCode> {
        match self {
            Self::Protocol(err) => err.problem_report_code(),
            _ => None,
        }
    }
}
