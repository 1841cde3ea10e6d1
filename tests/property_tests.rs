//! Property-based tests using proptest
//!
//! These tests validate reassembly and parsing invariants across randomly
//! generated packet streams and chunkings.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use bytes::BytesMut;
use common::{frame, query, registry, result_set, ts, EOF, OK_EMPTY};
use proptest::prelude::*;
use wire_playback::core::packet::PacketHeader;
use wire_playback::core::reassembly::ReassemblyBuffer;
use wire_playback::protocol::{ConnectionIdentity, Direction, QueryStatus};
use wire_playback::utils::EventKind;

/// Split `data` at the given cut points (taken modulo its length)
fn chunk(data: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    if data.is_empty() {
        return vec![];
    }
    let mut points: Vec<usize> = cuts.iter().map(|c| c % data.len()).collect();
    points.push(0);
    points.push(data.len());
    points.sort_unstable();
    points.dedup();
    points.windows(2).map(|w| data[w[0]..w[1]].to_vec()).collect()
}

fn packet_stream() -> impl Strategy<Value = Vec<(u8, Vec<u8>)>> {
    prop::collection::vec(
        (any::<u8>(), prop::collection::vec(any::<u8>(), 0..300)),
        1..20,
    )
}

// Property: header encoding round-trips for every 24-bit length
proptest! {
    #[test]
    fn prop_header_roundtrip(length in 0u32..=0x00FF_FFFF, seq in any::<u8>()) {
        let header = PacketHeader::new(length, seq);
        let mut buf = BytesMut::new();
        header.encode(&mut buf);

        prop_assert_eq!(buf.len(), PacketHeader::SIZE);
        prop_assert_eq!(&buf[..], &header.to_bytes()[..]);

        let decoded = PacketHeader::decode(&buf).expect("complete header");
        prop_assert_eq!(decoded, header);
        prop_assert_eq!(decoded.full_length(), PacketHeader::SIZE + length as usize);
    }
}

// Property: reassembly yields the same packets however the stream is chunked
proptest! {
    #[test]
    fn prop_chunking_invariance(
        packets in packet_stream(),
        cuts in prop::collection::vec(any::<usize>(), 0..40),
    ) {
        let stream: Vec<u8> = packets.iter().flat_map(|(seq, p)| frame(*seq, p)).collect();

        let mut buffer = ReassemblyBuffer::new();
        let mut produced = Vec::new();
        for piece in chunk(&stream, &cuts) {
            buffer.extend(&piece);
            produced.extend(buffer.drain_packets());
        }

        prop_assert_eq!(produced.len(), packets.len());
        for (packet, (seq, payload)) in produced.iter().zip(&packets) {
            prop_assert_eq!(packet.sequence_id(), *seq);
            prop_assert_eq!(&packet.payload[..], &payload[..]);
        }
        prop_assert!(!buffer.fragmented());
        prop_assert_eq!(buffer.buffered_len(), 0);
    }
}

// Property: a strict prefix of a packet is fragmented and yields nothing
proptest! {
    #[test]
    fn prop_prefix_is_fragmented(
        payload in prop::collection::vec(any::<u8>(), 1..500),
        cut in any::<usize>(),
    ) {
        let bytes = frame(0, &payload);
        let prefix = 1 + cut % (bytes.len() - 1);

        let mut buffer = ReassemblyBuffer::new();
        prop_assert!(buffer.feed(&bytes[..prefix]).is_none());
        prop_assert!(buffer.fragmented());
        prop_assert!(buffer.feed(&bytes[prefix..]).is_some());
        prop_assert!(!buffer.fragmented());
    }
}

// Property: a captured conversation parses the same however its segments are cut
proptest! {
    #[test]
    fn prop_conversation_chunking_invariance(
        rows in 0usize..50,
        client_cuts in prop::collection::vec(any::<usize>(), 0..10),
        server_cuts in prop::collection::vec(any::<usize>(), 0..30),
    ) {
        let (registry, replay, stats) = registry();
        let id = ConnectionIdentity::new(0x0A00_0001, 45000);

        let mut client_bytes = query("SELECT a FROM t");
        let server_bytes = result_set(rows);

        for piece in chunk(&client_bytes, &client_cuts) {
            registry.deliver_bytes(id, Direction::ClientToServer, ts(1), &piece).unwrap();
        }
        for piece in chunk(&server_bytes, &server_cuts) {
            registry.deliver_bytes(id, Direction::ServerToClient, ts(2), &piece).unwrap();
        }

        let info = registry.last_executed_query_info(id).unwrap();
        prop_assert_eq!(info.status, QueryStatus::Completed);
        prop_assert_eq!(info.result.rows_sent, rows as u64);
        prop_assert_eq!(stats.count(EventKind::ResultDispatched), 1);
        prop_assert_eq!(replay.queries_for(id), vec!["SELECT a FROM t".to_string()]);

        // Still resting after the result; a follow-up OK exchange completes too
        client_bytes = query("DO 1");
        registry.deliver_bytes(id, Direction::ClientToServer, ts(3), &client_bytes).unwrap();
        registry.deliver_bytes(id, Direction::ServerToClient, ts(4), &frame(1, &OK_EMPTY)).unwrap();
        prop_assert_eq!(stats.count(EventKind::ResultDispatched), 2);
    }
}

// Property: eof_count never passes the completion threshold
proptest! {
    #[test]
    fn prop_eof_count_bounded(extra_markers in 0usize..5, rows in 0usize..10) {
        let (registry, _replay, _stats) = registry();
        let id = ConnectionIdentity::new(0x0A00_0002, 45001);

        registry.deliver_bytes(id, Direction::ClientToServer, ts(1), &query("SELECT 1")).unwrap();
        registry.deliver_bytes(id, Direction::ServerToClient, ts(2), &result_set(rows)).unwrap();
        for i in 0..extra_markers {
            registry
                .deliver_bytes(id, Direction::ServerToClient, ts(3), &frame(100 + i as u8, &EOF))
                .unwrap();
        }

        let eof_count = registry.inspect(id, |s| s.eof_count()).unwrap();
        prop_assert!(eof_count <= 2);
    }
}

// Property: arbitrary bytes never panic the parser
proptest! {
    #[test]
    fn prop_arbitrary_bytes_never_panic(
        client_bytes in prop::collection::vec(any::<u8>(), 0..512),
        server_bytes in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let (registry, _replay, _stats) = registry();
        let id = ConnectionIdentity::new(0x0A00_0003, 45002);

        registry.deliver_bytes(id, Direction::ClientToServer, ts(1), &client_bytes).unwrap();
        registry.deliver_bytes(id, Direction::ServerToClient, ts(2), &server_bytes).unwrap();
        prop_assert!(registry.notify_connection_closed(id).unwrap().is_some());
    }
}
