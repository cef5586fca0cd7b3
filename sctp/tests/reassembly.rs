//! Integration tests for message transfer between two associations
//!
//! Covers fragmentation on the sending side, reassembly and ordering on
//! the receiving side, and the SACK feedback loop.

mod common;

use common::{established_pair, established_pair_with, send_to};
use sctp::{Chunk, DataChunk, ErrorCause, Fragment, SctpConfig, SctpPacket};

const NOW: u64 = 1_700_000_000_000;

fn packet_to(tag: u32, chunks: Vec<DataChunk>) -> SctpPacket {
    let mut packet = SctpPacket::new(5000, 5000, tag);
    for chunk in chunks {
        packet.add_chunk(Chunk::Data(chunk));
    }
    packet
}

#[test]
fn test_large_message_round_trip() {
    let (mut client, mut server) = established_pair();
    let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();

    client.send(3, 53, payload.clone(), true).unwrap();
    let packets = client.poll_send();
    assert_eq!(packets.len(), 5);

    let sacks = send_to(&mut server, &packets, NOW);
    send_to(&mut client, &sacks, NOW);

    let received = &server.listener().messages;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].stream_id, 3);
    assert_eq!(received[0].ppid, 53);
    assert_eq!(received[0].data, payload);
    assert_eq!(client.in_flight_chunks(), 0);
}

#[test]
fn test_ordered_messages_keep_send_order() {
    let (mut client, mut server) = established_pair();
    for word in ["one", "two", "three"] {
        client.send(1, 51, word.as_bytes().to_vec(), true).unwrap();
    }

    let mut packets = client.poll_send();
    assert_eq!(packets.len(), 1);
    // Reverse the bundle so the receiver sees the last message first
    packets[0].chunks.reverse();
    send_to(&mut server, &packets, NOW);

    let words: Vec<&[u8]> = server
        .listener()
        .messages
        .iter()
        .map(|m| m.data.as_slice())
        .collect();
    assert_eq!(words, vec![b"one".as_slice(), b"two".as_slice(), b"three".as_slice()]);
}

#[test]
fn test_out_of_order_fragments_across_packets() {
    let (client, mut server) = established_pair();
    let tag = server.local_verification_tag();
    let tsn = client.local_initial_tsn();

    let end = packet_to(
        tag,
        vec![DataChunk::fragment_of(
            Fragment::End,
            tsn.wrapping_add(2),
            0,
            0,
            51,
            b"ld".to_vec(),
        )],
    );
    let begin = packet_to(
        tag,
        vec![DataChunk::fragment_of(
            Fragment::Begin,
            tsn,
            0,
            0,
            51,
            b"hel".to_vec(),
        )],
    );
    let middle = packet_to(
        tag,
        vec![DataChunk::fragment_of(
            Fragment::Middle,
            tsn.wrapping_add(1),
            0,
            0,
            51,
            b"lo wor".to_vec(),
        )],
    );

    let sack = send_to(&mut server, &[end], NOW);
    let Chunk::Sack(sack) = &sack[0].chunks[0] else {
        panic!("expected SACK");
    };
    assert_eq!(sack.cumulative_tsn, tsn.wrapping_sub(1));
    assert_eq!(sack.gap_ack_blocks, vec![(3, 3)]);

    send_to(&mut server, &[begin], NOW);
    assert!(server.listener().messages.is_empty());
    assert_eq!(server.stashed_chunks(), 2);

    send_to(&mut server, &[middle], NOW);
    assert_eq!(server.listener().messages.len(), 1);
    assert_eq!(server.listener().messages[0].data, b"hello world");
    assert_eq!(server.stashed_chunks(), 0);
    assert_eq!(server.cumulative_tsn_received(), tsn.wrapping_add(2));
}

#[test]
fn test_unordered_message_skips_ahead() {
    let (client, mut server) = established_pair();
    let tag = server.local_verification_tag();
    let tsn = client.local_initial_tsn();

    let mut late = DataChunk::new(tsn.wrapping_add(1), 2, 0, 51, b"urgent".to_vec());
    late.unordered = true;

    send_to(&mut server, &[packet_to(tag, vec![late])], NOW);
    assert_eq!(server.listener().messages.len(), 1);
    assert!(!server.listener().messages[0].ordered);
    assert!(!server.stream(2).unwrap().is_ordered());
}

#[test]
fn test_forced_ordering_overrides_flag() {
    let (client, mut server) = established_pair();
    let tag = server.local_verification_tag();
    let tsn = client.local_initial_tsn();
    server.set_stream_ordering(4, false);

    // Ordered flag on the wire, but stream 4 is forced unordered
    let chunk = DataChunk::new(tsn.wrapping_add(5), 4, 9, 51, b"x".to_vec());
    send_to(&mut server, &[packet_to(tag, vec![chunk])], NOW);

    assert_eq!(server.listener().messages.len(), 1);
    assert!(!server.listener().messages[0].ordered);
}

#[test]
fn test_refused_message_redelivered() {
    let (mut client, mut server) = established_pair();
    client.send(0, 51, b"later".to_vec(), true).unwrap();

    server.listener_mut().refuse = true;
    let sacks = send_to(&mut server, &client.poll_send(), NOW);
    assert!(server.listener().messages.is_empty());
    assert_eq!(server.stashed_chunks(), 1);

    // Buffered bytes shrink the advertised window
    let Chunk::Sack(sack) = &sacks[0].chunks[0] else {
        panic!("expected SACK");
    };
    assert_eq!(sack.a_rwnd, server.config().recv_window - 5);

    server.listener_mut().refuse = false;
    assert_eq!(server.deliver_pending(), 1);
    assert_eq!(server.deliver_pending(), 0);
    assert_eq!(server.listener().messages[0].data, b"later");
}

#[test]
fn test_duplicate_data_reported_in_sack() {
    let (mut client, mut server) = established_pair();
    client.send(0, 51, b"once".to_vec(), true).unwrap();
    let packets = client.poll_send();

    send_to(&mut server, &packets, NOW);
    let sacks = send_to(&mut server, &packets, NOW);

    let Chunk::Sack(sack) = &sacks[0].chunks[0] else {
        panic!("expected SACK");
    };
    assert_eq!(sack.duplicate_tsns, vec![client.local_initial_tsn()]);
    assert_eq!(server.listener().messages.len(), 1);
}

#[test]
fn test_invalid_stream_does_not_block_others() {
    let server_config = SctpConfig {
        max_inbound_streams: 2,
        ..SctpConfig::default()
    };
    let (client, mut server) = established_pair_with(SctpConfig::default(), server_config);
    let tag = server.local_verification_tag();
    let tsn = client.local_initial_tsn();

    let replies = send_to(
        &mut server,
        &[packet_to(
            tag,
            vec![
                DataChunk::new(tsn, 7, 0, 51, b"lost".to_vec()),
                DataChunk::new(tsn.wrapping_add(1), 1, 0, 51, b"kept".to_vec()),
            ],
        )],
        NOW,
    );

    assert_eq!(server.listener().messages.len(), 1);
    assert_eq!(server.listener().messages[0].data, b"kept");
    let Some(Chunk::Sack(sack)) = replies[0].chunks.last() else {
        panic!("expected SACK last");
    };
    assert_eq!(sack.cumulative_tsn, tsn.wrapping_add(1));
}

fn unordered_single(tsn: u32) -> DataChunk {
    let mut chunk = DataChunk::new(tsn, 0, 0, 51, vec![7]);
    chunk.unordered = true;
    chunk
}

#[test]
fn test_sack_fits_mtu_with_thousands_of_holes() {
    let (client, mut server) = established_pair();
    let tag = server.local_verification_tag();
    let tsn = client.local_initial_tsn();

    // Every other TSN, each delivered at once, so nothing stays stashed
    let chunks = (0..3000u32)
        .map(|i| unordered_single(tsn.wrapping_add(2 * i + 1)))
        .collect();
    let replies = send_to(&mut server, &[packet_to(tag, chunks)], NOW);

    assert_eq!(server.listener().messages.len(), 3000);
    assert_eq!(server.stashed_chunks(), 0);
    assert!(server.is_established());

    let bytes = replies[0].to_bytes().unwrap();
    assert!(bytes.len() <= server.config().mtu);
    let decoded = SctpPacket::from_bytes(&bytes).unwrap();
    let Some(Chunk::Sack(sack)) = decoded.chunks.last() else {
        panic!("expected SACK");
    };
    assert_eq!(sack.cumulative_tsn, tsn.wrapping_sub(1));
    assert_eq!(sack.gap_ack_blocks.len(), (1200 - 12 - 16) / 4);
    assert_eq!(sack.gap_ack_blocks[0], (2, 2));
}

#[test]
fn test_unbounded_holes_abort_association() {
    let server_config = SctpConfig {
        max_stash_chunks: 8,
        ..SctpConfig::default()
    };
    let (client, mut server) = established_pair_with(SctpConfig::default(), server_config);
    let tag = server.local_verification_tag();
    let tsn = client.local_initial_tsn();

    let chunks = (0..9u32)
        .map(|i| unordered_single(tsn.wrapping_add(2 * i + 1)))
        .collect();
    let replies = send_to(&mut server, &[packet_to(tag, chunks)], NOW);

    assert!(!server.is_established());
    assert_eq!(server.listener().aborted.len(), 1);
    let Chunk::Abort { causes, .. } = &replies[0].chunks[0] else {
        panic!("expected ABORT");
    };
    assert_eq!(causes, &vec![ErrorCause::OutOfResource]);
}

#[test]
fn test_hole_filler_accepted_at_bound() {
    let server_config = SctpConfig {
        max_stash_chunks: 4,
        ..SctpConfig::default()
    };
    let (client, mut server) = established_pair_with(SctpConfig::default(), server_config);
    let tag = server.local_verification_tag();
    let tsn = client.local_initial_tsn();

    let above = (1..=4u32).map(|i| unordered_single(tsn.wrapping_add(i))).collect();
    send_to(&mut server, &[packet_to(tag, above)], NOW);
    assert!(server.is_established());

    send_to(&mut server, &[packet_to(tag, vec![unordered_single(tsn)])], NOW);
    assert!(server.is_established());
    assert_eq!(server.cumulative_tsn_received(), tsn.wrapping_add(4));
}

#[test]
fn test_deliverable_chunks_do_not_hit_stash_bound() {
    let server_config = SctpConfig {
        max_stash_chunks: 2,
        ..SctpConfig::default()
    };
    let (client, mut server) = established_pair_with(SctpConfig::default(), server_config);
    let tag = server.local_verification_tag();
    let tsn = client.local_initial_tsn();

    let chunks = (0..6u16)
        .map(|ssn| DataChunk::new(tsn.wrapping_add(ssn as u32), 0, ssn, 51, vec![ssn as u8]))
        .collect();
    send_to(&mut server, &[packet_to(tag, chunks)], NOW);

    assert!(server.is_established());
    assert!(server.listener().aborted.is_empty());
    let data: Vec<u8> = server.listener().messages.iter().map(|m| m.data[0]).collect();
    assert_eq!(data, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(server.stashed_chunks(), 0);
}
