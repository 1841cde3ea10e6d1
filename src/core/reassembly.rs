//! # Reassembly Buffer
//!
//! Capture hands us payload bytes in chunks whose boundaries have nothing to do
//! with logical packet boundaries. A chunk may hold a fraction of a packet,
//! exactly one packet, or several packets followed by a fragment of the next.
//!
//! `ReassemblyBuffer` accumulates bytes for one direction of one connection and
//! splits complete packets off the front. Leftover bytes stay buffered for the
//! next delivery. No upper bound is enforced here: a declared length larger than
//! any real message is simply more fragmentation. Callers that need a stall
//! guard check `buffered_len()` against their own limit.
//!
//! ```rust
//! use wire_playback::core::reassembly::ReassemblyBuffer;
//!
//! let mut buffer = ReassemblyBuffer::new();
//! assert!(buffer.feed(&[0x03, 0x00, 0x00, 0x00, b'a']).is_none());
//! assert!(buffer.fragmented());
//!
//! let packet = buffer.feed(b"bc").expect("complete");
//! assert_eq!(&packet.payload[..], b"abc");
//! assert!(!buffer.fragmented());
//! ```

use bytes::BytesMut;

use crate::core::codec::PacketCodec;
use crate::core::packet::Packet;

/// Per-direction byte accumulator
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    buf: BytesMut,
    codec: PacketCodec,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return the first complete packet, if any.
    ///
    /// More packets may be complete after this returns; drain them with
    /// [`next_packet`](Self::next_packet) until it yields `None`.
    pub fn feed(&mut self, bytes: &[u8]) -> Option<Packet> {
        self.buf.extend_from_slice(bytes);
        self.next_packet()
    }

    /// Append `bytes` without extracting anything
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Split the next complete packet off the buffer
    pub fn next_packet(&mut self) -> Option<Packet> {
        self.codec.decode_frame(&mut self.buf)
    }

    /// Drain every complete packet currently buffered
    pub fn drain_packets(&mut self) -> impl Iterator<Item = Packet> + '_ {
        std::iter::from_fn(move || self.next_packet())
    }

    /// Whether a complete packet is waiting at the front of the buffer
    pub fn has_complete_packet(&self) -> bool {
        PacketCodec::peek_length(&self.buf).is_some_and(|total| self.buf.len() >= total)
    }

    /// Bytes are pending but they do not yet form a complete packet
    pub fn fragmented(&self) -> bool {
        !self.buf.is_empty() && !self.has_complete_packet()
    }

    /// Number of bytes held back waiting for the rest of a packet
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Declared total length of the pending packet, once its header is buffered
    pub fn pending_packet_len(&self) -> Option<usize> {
        PacketCodec::peek_length(&self.buf)
    }

    /// Discard everything buffered, used to resynchronize after a stall
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
