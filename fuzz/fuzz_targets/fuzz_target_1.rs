#![no_main]

use libfuzzer_sys::fuzz_target;
use wire_playback::core::packet::{Packet, PacketHeader};
use wire_playback::core::reassembly::ReassemblyBuffer;

fuzz_target!(|data: &[u8]| {
    // Fuzz framing - test for panics, crashes, infinite loops
    let _ = PacketHeader::decode(data);
    let _ = Packet::from_bytes(data);

    // Reassembly must account for every byte it was given
    let mut buffer = ReassemblyBuffer::new();
    let mut consumed = 0;
    for piece in data.chunks(7) {
        buffer.extend(piece);
        for packet in buffer.drain_packets() {
            consumed += packet.len();
        }
    }
    assert_eq!(consumed + buffer.buffered_len(), data.len());
});
