mod common;

use bytes::BytesMut;
use common::{client, query, registry, result_set, ts};
use tokio_util::codec::{Decoder, Encoder};
use wire_playback::core::codec::PacketCodec;
use wire_playback::core::packet::Packet;
use wire_playback::protocol::{Direction, QueryStatus};
use wire_playback::utils::EventKind;

#[test]
fn stress_packet_encode_decode_large_series() {
    // Heavy burst of packets through one buffer, no panics and nothing left behind
    let mut codec = PacketCodec;
    let mut buf = BytesMut::new();

    for size in [0usize, 1, 64, 512, 4096, 65536, 1_048_576] {
        for seq in 0..1_000u32 {
            let p = Packet::new(seq as u8, vec![0u8; size]).unwrap();
            codec.encode(p, &mut buf).unwrap();
            let decoded = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(decoded.payload.len(), size);
            assert!(buf.is_empty());
        }
    }
}

#[test]
fn stress_long_session() {
    let (registry, replay, stats) = registry();
    let id = client(60000);

    for i in 0..10_000u64 {
        registry
            .deliver_bytes(id, Direction::ClientToServer, ts(i * 2), &query("SELECT v FROM t WHERE id = ?"))
            .unwrap();
        registry
            .deliver_bytes(id, Direction::ServerToClient, ts(i * 2 + 1), &result_set((i % 20) as usize))
            .unwrap();
    }

    assert_eq!(stats.count(EventKind::ResultDispatched), 10_000);
    assert_eq!(replay.submitted.lock().unwrap().len(), 10_000);
    let info = registry.last_executed_query_info(id).unwrap();
    assert_eq!(info.status, QueryStatus::Completed);
    assert_eq!(info.result.rows_sent, 19);
}
