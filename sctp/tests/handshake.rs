//! Integration tests for association setup and teardown
//!
//! Covers:
//! - Four-way handshake and stream negotiation
//! - Stale, forged and misaddressed cookies
//! - Graceful shutdown, with and without data in flight
//! - Abort in both directions

mod common;

use common::{endpoint, established_pair, established_pair_with, pump, send_to};
use sctp::codec::param::param_type;
use sctp::{
    AbortReason, AssociationState, Chunk, CookieError, ErrorCause, Parameter, SctpConfig,
    SctpError,
};

const T0: u64 = 1_700_000_000_000;

#[test]
fn test_handshake_with_explicit_clock() {
    let mut client = endpoint(SctpConfig::default());
    let mut server = endpoint(SctpConfig::default());

    let init = client.connect().unwrap();
    let init_ack = send_to(&mut server, &[init], T0);
    assert_eq!(server.state(), AssociationState::Closed);

    let echo = send_to(&mut client, &init_ack, T0);
    assert_eq!(client.state(), AssociationState::CookieEchoed);
    assert!(matches!(echo[0].chunks[0], Chunk::CookieEcho(_)));

    let ack = send_to(&mut server, &echo, T0 + 10);
    assert_eq!(server.state(), AssociationState::Established);
    assert_eq!(ack[0].chunks, vec![Chunk::CookieAck]);

    assert!(send_to(&mut client, &ack, T0 + 20).is_empty());
    assert!(client.is_established());
    assert_eq!(client.listener().established, 1);
    assert_eq!(server.listener().established, 1);
}

#[test]
fn test_streams_negotiated_to_minimum() {
    let client_config = SctpConfig {
        max_outbound_streams: 10,
        max_inbound_streams: 4,
        ..SctpConfig::default()
    };
    let server_config = SctpConfig {
        max_outbound_streams: 8,
        max_inbound_streams: 6,
        ..SctpConfig::default()
    };
    let (client, server) = established_pair_with(client_config, server_config);

    assert_eq!(client.num_outbound_streams(), 6);
    assert_eq!(server.num_inbound_streams(), 6);
    assert_eq!(client.num_inbound_streams(), 4);
    assert_eq!(server.num_outbound_streams(), 4);
}

#[test]
fn test_stale_cookie_restarts_with_preservative() {
    let mut client = endpoint(SctpConfig::default());
    let mut server = endpoint(SctpConfig::default());
    let lifetime = server.config().cookie_lifetime_ms as u64;

    let init_ack = send_to(&mut server, &[client.connect().unwrap()], T0);
    let echo = send_to(&mut client, &init_ack, T0);

    // Half a second past the cookie lifetime
    let late = T0 + lifetime + 500;
    let error = send_to(&mut server, &echo, late);
    assert_eq!(server.state(), AssociationState::Closed);
    assert_eq!(
        error[0].chunks,
        vec![Chunk::Error {
            causes: vec![ErrorCause::StaleCookie {
                staleness_us: 500_000
            }]
        }]
    );
    assert_eq!(error[0].verification_tag, client.local_verification_tag());
    assert_eq!(
        server.listener().aborted,
        vec![AbortReason::Cookie(CookieError::Expired {
            staleness_us: 500_000
        })]
    );

    let retry = send_to(&mut client, &error, late);
    assert_eq!(client.state(), AssociationState::CookieWait);
    assert_eq!(retry[0].verification_tag, 0);
    let Chunk::Init(init) = &retry[0].chunks[0] else {
        panic!("expected INIT");
    };
    assert!(init.params.contains(&Parameter::CookiePreservative(1002)));

    let init_ack = send_to(&mut server, &retry, late);
    let echo = send_to(&mut client, &init_ack, late);
    let ack = send_to(&mut server, &echo, late + lifetime + 1000);
    send_to(&mut client, &ack, late);

    assert!(server.is_established());
    assert!(client.is_established());
}

#[test]
fn test_cookie_with_wrong_tag_aborts() {
    let mut client = endpoint(SctpConfig::default());
    let mut server = endpoint(SctpConfig::default());

    let init_ack = send_to(&mut server, &[client.connect().unwrap()], T0);
    let mut echo = send_to(&mut client, &init_ack, T0);
    let expected = echo[0].verification_tag;
    echo[0].verification_tag = expected.wrapping_add(1);

    let abort = send_to(&mut server, &echo, T0);
    assert_eq!(server.state(), AssociationState::Closed);
    assert!(matches!(
        server.listener().aborted[0],
        AbortReason::Cookie(CookieError::TagMismatch { .. })
    ));
    assert!(matches!(
        &abort[0].chunks[0],
        Chunk::Abort { t_bit: false, causes } if causes[0].code() == 13
    ));

    send_to(&mut client, &abort, T0);
    assert_eq!(client.state(), AssociationState::Closed);
    assert!(matches!(client.listener().aborted[0], AbortReason::Peer(_)));
}

#[test]
fn test_forged_cookie_aborts_with_reflected_tag() {
    let mut client = endpoint(SctpConfig::default());
    let mut server = endpoint(SctpConfig::default());

    let init_ack = send_to(&mut server, &[client.connect().unwrap()], T0);
    let mut echo = send_to(&mut client, &init_ack, T0);
    if let Chunk::CookieEcho(cookie) = &mut echo[0].chunks[0] {
        let last = cookie.len() - 1;
        cookie[last] ^= 0xff;
    }

    let abort = send_to(&mut server, &echo, T0);
    assert_eq!(
        server.listener().aborted,
        vec![AbortReason::Cookie(CookieError::BadSignature)]
    );
    assert!(matches!(abort[0].chunks[0], Chunk::Abort { t_bit: true, .. }));
    assert_eq!(abort[0].verification_tag, client.peer_verification_tag());

    send_to(&mut client, &abort, T0);
    assert_eq!(client.state(), AssociationState::Closed);
}

#[test]
fn test_duplicate_cookie_echo_acknowledged_again() {
    let mut client = endpoint(SctpConfig::default());
    let mut server = endpoint(SctpConfig::default());

    let init_ack = send_to(&mut server, &[client.connect().unwrap()], T0);
    let echo = send_to(&mut client, &init_ack, T0);
    send_to(&mut server, &echo, T0);

    // First COOKIE-ACK lost; the client echoes again
    let again = send_to(&mut server, &echo, T0 + 100);
    assert_eq!(again[0].chunks, vec![Chunk::CookieAck]);
    assert_eq!(server.listener().established, 1);

    send_to(&mut client, &again, T0 + 100);
    assert!(client.is_established());
}

#[test]
fn test_init_ack_without_cookie_aborts() {
    let mut client = endpoint(SctpConfig::default());
    let mut server = endpoint(SctpConfig::default());

    let mut init_ack = send_to(&mut server, &[client.connect().unwrap()], T0);
    if let Chunk::InitAck(chunk) = &mut init_ack[0].chunks[0] {
        chunk
            .params
            .retain(|param| !matches!(param, Parameter::StateCookie(_)));
    }

    let abort = send_to(&mut client, &init_ack, T0);
    assert_eq!(client.state(), AssociationState::Closed);
    assert!(matches!(
        &abort[0].chunks[0],
        Chunk::Abort { causes, .. }
            if causes[0] == ErrorCause::MissingMandatoryParameter(vec![param_type::STATE_COOKIE])
    ));
}

#[test]
fn test_unknown_init_parameter_reported_in_init_ack() {
    let mut client = endpoint(SctpConfig::default());
    let mut server = endpoint(SctpConfig::default());

    let mut init = client.connect().unwrap();
    let unknown = Parameter::Unknown {
        param_type: 0x4123,
        value: vec![1, 2, 3],
    };
    if let Chunk::Init(chunk) = &mut init.chunks[0] {
        chunk.params.push(unknown.clone());
    }

    let init_ack = send_to(&mut server, &[init], T0);
    let Chunk::InitAck(chunk) = &init_ack[0].chunks[0] else {
        panic!("expected INIT-ACK");
    };
    assert!(
        chunk
            .params
            .contains(&Parameter::UnrecognizedParameter(unknown.to_bytes()))
    );
}

#[test]
fn test_init_with_zero_tag_aborted() {
    let mut client = endpoint(SctpConfig::default());
    let mut server = endpoint(SctpConfig::default());

    let mut init = client.connect().unwrap();
    if let Chunk::Init(chunk) = &mut init.chunks[0] {
        chunk.num_inbound_streams = 0;
    }

    let reply = send_to(&mut server, &[init], T0);
    assert!(matches!(
        &reply[0].chunks[0],
        Chunk::Abort { causes, .. } if causes[0] == ErrorCause::InvalidMandatoryParameter
    ));
    assert_eq!(server.state(), AssociationState::Closed);
}

#[test]
fn test_graceful_shutdown() {
    let (mut client, mut server) = established_pair();

    let shutdown = client.shutdown().unwrap().unwrap();
    assert_eq!(client.state(), AssociationState::ShutdownSent);
    assert!(matches!(shutdown.chunks[0], Chunk::Shutdown { .. }));

    let shutdown_ack = send_to(&mut server, &[shutdown], T0);
    assert_eq!(server.state(), AssociationState::ShutdownAckSent);
    assert_eq!(shutdown_ack[0].chunks, vec![Chunk::ShutdownAck]);

    let complete = send_to(&mut client, &shutdown_ack, T0);
    assert_eq!(client.state(), AssociationState::Closed);
    assert_eq!(
        complete[0].chunks,
        vec![Chunk::ShutdownComplete { t_bit: false }]
    );

    assert!(send_to(&mut server, &complete, T0).is_empty());
    assert_eq!(server.state(), AssociationState::Closed);
    assert_eq!(client.listener().shutdown_complete, 1);
    assert_eq!(server.listener().shutdown_complete, 1);
}

#[test]
fn test_shutdown_waits_for_in_flight_data() {
    let (mut client, mut server) = established_pair();
    client.send(0, 51, b"last words".to_vec(), true).unwrap();
    let data = client.poll_send();

    assert!(client.shutdown().unwrap().is_none());
    assert_eq!(client.state(), AssociationState::ShutdownPending);
    assert!(matches!(
        client.send(0, 51, b"too late".to_vec(), true),
        Err(SctpError::InvalidState(_))
    ));

    // The SACK drains the in-flight set and lets SHUTDOWN out
    pump(&mut client, &mut server, data);

    assert_eq!(server.listener().messages.len(), 1);
    assert_eq!(client.state(), AssociationState::Closed);
    assert_eq!(server.state(), AssociationState::Closed);
    assert_eq!(client.listener().shutdown_complete, 1);
}

#[test]
fn test_shutdown_requires_association() {
    let mut assoc = endpoint(SctpConfig::default());
    assert!(matches!(assoc.shutdown(), Err(SctpError::InvalidState(_))));
}

#[test]
fn test_cookie_echo_while_shutting_down() {
    let mut client = endpoint(SctpConfig::default());
    let mut server = endpoint(SctpConfig::default());

    let init_ack = send_to(&mut server, &[client.connect().unwrap()], T0);
    let echo = send_to(&mut client, &init_ack, T0);
    let ack = send_to(&mut server, &echo, T0);
    send_to(&mut client, &ack, T0);

    // Server keeps data in flight so it stays in SHUTDOWN-PENDING
    server.send(0, 51, vec![1], true).unwrap();
    server.poll_send();
    server.shutdown().unwrap();

    let reply = send_to(&mut server, &echo, T0);
    assert_eq!(
        reply[0].chunks,
        vec![Chunk::Error {
            causes: vec![ErrorCause::CookieReceivedWhileShuttingDown]
        }]
    );
}

#[test]
fn test_abort_in_cookie_wait_sends_nothing() {
    let mut client = endpoint(SctpConfig::default());
    client.connect().unwrap();

    assert!(client.abort("give up").is_none());
    assert_eq!(client.state(), AssociationState::Closed);
    assert_eq!(client.listener().aborted.len(), 1);
}

#[test]
fn test_abort_from_server_closes_client() {
    let (mut client, mut server) = established_pair();
    let abort = server.abort("maintenance").unwrap();
    assert_eq!(abort.verification_tag, client.local_verification_tag());

    send_to(&mut client, &[abort], T0);
    assert_eq!(client.state(), AssociationState::Closed);
    assert_eq!(
        client.listener().aborted,
        vec![AbortReason::Peer(vec![ErrorCause::UserInitiatedAbort(
            b"maintenance".to_vec()
        )])]
    );
}
