//! End-to-end exchanges between two in-memory agents.

mod common;

use common::{agent, sent_message};
use didexchange::config::Config;
use didexchange::error::{ConfigError, ExchangeError, ProblemReportCode, ProtocolError};
use didexchange::manager::InvitationOptions;
use didexchange::messages::{qualify, ExchangeComplete, ExchangeRequest, ExchangeResponse};
use didexchange::record::{ConnectionRecord, InvitationMode, Role, State};
use didexchange::receipt::MessageReceipt;

fn auto_endpoint(endpoint: &str) -> Config {
    Config {
        endpoint: Some(endpoint.to_owned()),
        ..Default::default()
    }
}

#[tokio::test]
async fn ephemeral_invitation_auto_accept_round_trip() {
    let alice = agent(auto_endpoint("http://alice"));
    let bob = agent(auto_endpoint("http://bob"));

    let (alice_conn, invitation) = alice
        .manager
        .create_invitation(InvitationOptions {
            auto_accept: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    let alice_conn = alice_conn.unwrap();
    assert_eq!(alice_conn.state, State::Invitation);
    assert_eq!(alice_conn.their_role, Role::Requester);
    let invitation_key = alice_conn.invitation_key.clone().unwrap();

    // Bob takes the invitation and auto-sends his request.
    let bob_conn = bob
        .manager
        .receive_invitation(invitation, Some(true), None)
        .await
        .unwrap();
    assert_eq!(bob_conn.state, State::Request);
    let request: ExchangeRequest = sent_message(&bob.responder);
    assert_eq!(request.thread_id(), request.id);
    assert_eq!(bob_conn.request_id.as_deref(), Some(request.id.as_str()));
    // pthid points at the first service of Bob's document.
    let pthid = request.thread.as_ref().unwrap().pthid.clone().unwrap();
    assert!(pthid.ends_with(";indy"));

    // Alice receives the request on her invitation key and auto-responds.
    let receipt = MessageReceipt::new(None, Some(invitation_key));
    let alice_conn = alice
        .manager
        .receive_request(request.clone(), &receipt)
        .await
        .unwrap();
    assert_eq!(alice_conn.state, State::Response);
    assert_eq!(alice_conn.their_did, Some(request.did.clone()));
    let response: ExchangeResponse = sent_message(&alice.responder);
    assert_eq!(response.thread_id(), request.id);

    // Bob accepts the response and closes with a complete message.
    let bob_conn = bob
        .manager
        .accept_response(response, &MessageReceipt::default())
        .await
        .unwrap();
    assert_eq!(bob_conn.state, State::Completed);
    let complete: ExchangeComplete = sent_message(&bob.responder);
    assert_eq!(complete.thread_id(), request.id);

    let alice_conn = alice
        .manager
        .accept_complete(complete, &MessageReceipt::default())
        .await
        .unwrap();
    assert_eq!(alice_conn.state, State::Completed);

    // Both sides agree on the DID pair.
    assert_eq!(alice_conn.my_did, bob_conn.their_did);
    assert_eq!(alice_conn.their_did, bob_conn.my_did);
    assert!(alice_conn.my_did.is_some() && alice_conn.their_did.is_some());
}

#[tokio::test]
async fn public_invitation_carries_only_the_did() {
    let alice = agent(Config {
        endpoint: Some("http://alice".to_owned()),
        public_invites: true,
        ..Default::default()
    });
    let public_did = alice.wallet.create_public_did().unwrap();

    let (record, invitation) = alice
        .manager
        .create_invitation(InvitationOptions {
            public: true,
            include_handshake: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(record.is_none());
    assert_eq!(invitation.service_dids(), vec![public_did.did.as_str()]);
    assert!(invitation.service_blocks().is_empty());
    assert_eq!(
        invitation.handshake_protocols,
        Some(vec![qualify("didexchange/1.0/invitation")])
    );
}

#[tokio::test]
async fn public_invitation_preconditions() {
    let alice = agent(Config::default());
    let err = alice
        .manager
        .create_invitation(InvitationOptions {
            public: true,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Config(ConfigError::PublicInvitesDisabled)
    ));

    let alice = agent(Config {
        public_invites: true,
        ..Default::default()
    });
    let err = alice
        .manager
        .create_invitation(InvitationOptions {
            public: true,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::Config(ConfigError::NoPublicDid)));

    alice.wallet.create_public_did().unwrap();
    let err = alice
        .manager
        .create_invitation(InvitationOptions {
            public: true,
            multi_use: true,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Config(ConfigError::MultiUseWithPublic)
    ));
}

#[tokio::test]
async fn request_against_public_did_creates_a_record() {
    let alice = agent(Config {
        endpoint: Some("http://alice".to_owned()),
        public_invites: true,
        ..Default::default()
    });
    let public_did = alice.wallet.create_public_did().unwrap();
    let (_, invitation) = alice
        .manager
        .create_invitation(InvitationOptions {
            public: true,
            ..Default::default()
        })
        .await
        .unwrap();

    let bob = agent(auto_endpoint("http://bob"));
    bob.manager
        .receive_invitation(invitation, Some(true), None)
        .await
        .unwrap();
    let request: ExchangeRequest = sent_message(&bob.responder);

    // Traffic to a public DID arrives annotated with the resolved DID.
    let receipt = MessageReceipt {
        sender_verkey: None,
        recipient_verkey: Some(public_did.verkey.clone()),
        sender_did: None,
        recipient_did: Some(public_did.did.clone()),
        recipient_did_public: true,
    };
    let alice_conn = alice.manager.receive_request(request, &receipt).await.unwrap();
    assert_eq!(alice_conn.state, State::Request);
    assert_eq!(alice_conn.invitation_key, Some(public_did.verkey));
}

#[tokio::test]
async fn public_request_is_refused_when_public_invites_disabled() {
    let carol = agent(auto_endpoint("http://carol"));
    let carol_public = carol.wallet.create_public_did().unwrap();

    let dave = agent(auto_endpoint("http://dave"));
    let invitation = didexchange::messages::OobInvitation::new(
        Some("Carol".to_owned()),
        None,
        vec![didexchange::messages::ServiceEntry::Did(carol_public.did.clone())],
    );
    dave.manager
        .receive_invitation(invitation, Some(true), None)
        .await
        .unwrap();
    let request: ExchangeRequest = sent_message(&dave.responder);

    let receipt = MessageReceipt {
        sender_verkey: None,
        recipient_verkey: Some(carol_public.verkey.clone()),
        sender_did: None,
        recipient_did: Some(carol_public.did.clone()),
        recipient_did_public: true,
    };
    let err = carol.manager.receive_request(request, &receipt).await.unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Config(ConfigError::PublicInvitesDisabled)
    ));
}

#[tokio::test]
async fn did_mismatch_is_rejected_with_problem_code() {
    let alice = agent(auto_endpoint("http://alice"));
    let bob = agent(auto_endpoint("http://bob"));

    let (alice_conn, invitation) = alice
        .manager
        .create_invitation(InvitationOptions::default())
        .await
        .unwrap();
    let alice_conn = alice_conn.unwrap();

    bob.manager
        .receive_invitation(invitation, Some(true), None)
        .await
        .unwrap();
    let mut request: ExchangeRequest = sent_message(&bob.responder);
    request.did = "did:sov:0000000000000000000000".to_owned();

    let receipt = MessageReceipt::new(None, alice_conn.invitation_key.clone());
    let err = alice.manager.receive_request(request, &receipt).await.unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Protocol(ProtocolError::DidMismatch { .. })
    ));
    assert_eq!(
        err.problem_report_code(),
        Some(ProblemReportCode::RequestNotAccepted)
    );

    // The invitation record was not advanced.
    let reloaded = ConnectionRecord::retrieve_by_id(alice.store.as_ref(), &alice_conn.connection_id)
        .await
        .unwrap();
    assert_eq!(reloaded.state, State::Invitation);
}

#[tokio::test]
async fn tampered_attachment_fails_signature_verification() {
    let alice = agent(auto_endpoint("http://alice"));
    let bob = agent(auto_endpoint("http://bob"));

    let (alice_conn, invitation) = alice
        .manager
        .create_invitation(InvitationOptions::default())
        .await
        .unwrap();
    let alice_conn = alice_conn.unwrap();

    bob.manager
        .receive_invitation(invitation, Some(true), None)
        .await
        .unwrap();
    let mut request: ExchangeRequest = sent_message(&bob.responder);

    // Swap the signed payload: the signature no longer covers it.
    let attach = request.did_doc_attach.as_mut().unwrap();
    let json = String::from_utf8(attach.content_bytes().unwrap()).unwrap();
    let tampered = json.replace("http://bob", "http://mallory");
    let mut forged = didexchange::messages::Attachment::from_bytes(tampered.as_bytes());
    forged.data.jws = attach.data.jws.clone();
    *attach = forged;

    let receipt = MessageReceipt::new(None, alice_conn.invitation_key.clone());
    let err = alice.manager.receive_request(request, &receipt).await.unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Protocol(ProtocolError::SignatureInvalid)
    ));

    let reloaded = ConnectionRecord::retrieve_by_id(alice.store.as_ref(), &alice_conn.connection_id)
        .await
        .unwrap();
    assert_eq!(reloaded.state, State::Invitation);
}

#[tokio::test]
async fn multi_use_invitation_fans_out_child_records() {
    let alice = agent(auto_endpoint("http://alice"));
    let (parent, invitation) = alice
        .manager
        .create_invitation(InvitationOptions {
            multi_use: true,
            ..Default::default()
        })
        .await
        .unwrap();
    let parent = parent.unwrap();
    assert_eq!(parent.invitation_mode, InvitationMode::Multi);
    let receipt = MessageReceipt::new(None, parent.invitation_key.clone());

    let mut children = vec![];
    for endpoint in ["http://bob", "http://carol"] {
        let peer = agent(auto_endpoint(endpoint));
        peer.manager
            .receive_invitation(invitation.clone(), Some(true), None)
            .await
            .unwrap();
        let request: ExchangeRequest = sent_message(&peer.responder);
        let child = alice.manager.receive_request(request, &receipt).await.unwrap();
        children.push(child);
    }

    // The parent never moves; each request spawned its own record.
    let parent = ConnectionRecord::retrieve_by_id(alice.store.as_ref(), &parent.connection_id)
        .await
        .unwrap();
    assert_eq!(parent.state, State::Invitation);
    assert_eq!(parent.my_did, None);

    assert_ne!(children[0].connection_id, children[1].connection_id);
    assert_ne!(children[0].connection_id, parent.connection_id);
    assert_ne!(children[0].my_did, children[1].my_did);
    for child in &children {
        assert_eq!(child.state, State::Request);
        assert!(child.my_did.is_some());
        assert_eq!(child.invitation_key, parent.invitation_key);
    }
}

#[tokio::test]
async fn response_for_unknown_thread_is_unmatched() {
    let bob = agent(auto_endpoint("http://bob"));
    let stray = ExchangeResponse::new(
        "did:sov:QmWbsNYhMrjHiqZDTUTEJs".to_owned(),
        didexchange::messages::Attachment::from_bytes(b"{}"),
    );

    let err = bob
        .manager
        .accept_response(stray, &MessageReceipt::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Protocol(ProtocolError::UnmatchedResponse)
    ));
    assert_eq!(
        err.problem_report_code(),
        Some(ProblemReportCode::ResponseNotAccepted)
    );
}

#[tokio::test]
async fn replayed_response_fails_wrong_state() {
    let alice = agent(auto_endpoint("http://alice"));
    let bob = agent(auto_endpoint("http://bob"));

    let (alice_conn, invitation) = alice
        .manager
        .create_invitation(InvitationOptions {
            auto_accept: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    let alice_key = alice_conn.unwrap().invitation_key.unwrap();

    bob.manager
        .receive_invitation(invitation, Some(true), None)
        .await
        .unwrap();
    let request: ExchangeRequest = sent_message(&bob.responder);
    let receipt = MessageReceipt::new(None, Some(alice_key));
    alice.manager.receive_request(request, &receipt).await.unwrap();
    let response: ExchangeResponse = sent_message(&alice.responder);

    let bob_conn = bob
        .manager
        .accept_response(response.clone(), &MessageReceipt::default())
        .await
        .unwrap();
    assert_eq!(bob_conn.state, State::Completed);
    bob.responder.take_sent();

    // A second identical response finds the record out of REQUEST.
    let err = bob
        .manager
        .accept_response(response, &MessageReceipt::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Protocol(ProtocolError::WrongState(State::Completed))
    ));
    let reloaded = ConnectionRecord::retrieve_by_id(bob.store.as_ref(), &bob_conn.connection_id)
        .await
        .unwrap();
    assert_eq!(reloaded.state, State::Completed);
}

#[tokio::test]
async fn complete_without_matching_thread_is_rejected() {
    let alice = agent(auto_endpoint("http://alice"));
    let err = alice
        .manager
        .accept_complete(ExchangeComplete::new(), &MessageReceipt::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Protocol(ProtocolError::CompleteNotAccepted)
    ));
    assert_eq!(
        err.problem_report_code(),
        Some(ProblemReportCode::CompleteNotAccepted)
    );
}

#[tokio::test]
async fn malformed_invitations_are_rejected() {
    let bob = agent(Config::default());

    // No services at all.
    let empty = didexchange::messages::OobInvitation::new(None, None, vec![]);
    let err = bob
        .manager
        .receive_invitation(empty, None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Protocol(ProtocolError::MalformedInvitation)
    ));

    // Inline block without an endpoint.
    let block = didexchange::messages::OobService {
        id: "#inline".to_owned(),
        service_type: "did-communication".to_owned(),
        recipient_keys: vec!["8HH5gYEeNc3z7PYXmd54d4x6qAfCNrqQqEB3nS7Zfu7K".to_owned()],
        routing_keys: vec![],
        service_endpoint: String::new(),
    };
    let invalid = didexchange::messages::OobInvitation::new(
        None,
        None,
        vec![didexchange::messages::ServiceEntry::Inline(block)],
    );
    let err = bob
        .manager
        .receive_invitation(invalid, None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Protocol(ProtocolError::MalformedInvitation)
    ));
}
