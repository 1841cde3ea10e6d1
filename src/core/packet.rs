//! Logical MySQL packet framing.
//!
//! Every logical packet starts with a four byte header: a 24-bit little-endian
//! payload length, stored as a 16-bit low half followed by an 8-bit high half,
//! and an 8-bit sequence id. The payload follows with no footer or checksum.
//!
//! ```text
//! [length_low(2, LE)] [length_high(1)] [sequence_id(1)] [payload(N)]
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};

/// Largest payload a single logical packet can declare (2^24 - 1)
pub const MAX_PAYLOAD_LENGTH: usize = 0x00FF_FFFF;

/// Decoded packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketHeader {
    /// Payload length, reconstructed as `low | (high << 16)`
    pub payload_length: u32,
    /// Sequence id, restarting at zero for every command
    pub sequence_id: u8,
}

impl PacketHeader {
    /// Fixed header size on the wire
    pub const SIZE: usize = 4;

    /// Build a header. Lengths wider than 24 bits are masked.
    pub fn new(payload_length: u32, sequence_id: u8) -> Self {
        Self {
            payload_length: payload_length & MAX_PAYLOAD_LENGTH as u32,
            sequence_id,
        }
    }

    /// Decode a header from the front of `src` without touching the payload.
    ///
    /// # Errors
    /// Returns `ProtocolError::TruncatedHeader` if fewer than `SIZE` bytes are
    /// available. Callers should treat this as "not enough data yet".
    #[inline]
    pub fn decode(src: &[u8]) -> Result<Self> {
        let Some(raw) = src.get(..Self::SIZE) else {
            return Err(ProtocolError::TruncatedHeader {
                available: src.len(),
            });
        };

        let low = u16::from_le_bytes([raw[0], raw[1]]);
        let high = raw[2];

        Ok(Self {
            payload_length: u32::from(low) | (u32::from(high) << 16),
            sequence_id: raw[3],
        })
    }

    /// Append the wire form of this header to `dst`
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(Self::SIZE);
        dst.put_slice(&self.to_bytes());
    }

    /// Wire form of this header
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let low = (self.payload_length & 0xFFFF) as u16;
        let high = ((self.payload_length >> 16) & 0xFF) as u8;
        let [l0, l1] = low.to_le_bytes();
        [l0, l1, high, self.sequence_id]
    }

    /// Declared payload length in bytes
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload_length as usize
    }

    /// Header plus declared payload
    #[inline]
    pub fn full_length(&self) -> usize {
        Self::SIZE + self.payload_len()
    }
}

/// A complete logical packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Bytes,
}

impl Packet {
    /// Build a packet whose header length matches `payload`.
    ///
    /// # Errors
    /// Returns `ProtocolError::OversizedPacket` when the payload does not fit in
    /// a single logical packet.
    pub fn new(sequence_id: u8, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LENGTH {
            return Err(ProtocolError::OversizedPacket(payload.len()));
        }

        Ok(Self {
            header: PacketHeader::new(payload.len() as u32, sequence_id),
            payload,
        })
    }

    /// Decode one packet from the front of `data`, copying its payload.
    ///
    /// # Errors
    /// `TruncatedHeader` or `TruncatedPayload` when `data` holds less than one
    /// complete packet.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = PacketHeader::decode(data)?;
        let end = header.full_length();

        let payload = data
            .get(PacketHeader::SIZE..end)
            .ok_or(ProtocolError::TruncatedPayload {
                expected: header.payload_len(),
                available: data.len() - PacketHeader::SIZE,
            })?;

        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(payload),
        })
    }

    /// Wire form of the whole packet
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Leading payload byte (command byte for client packets, marker for server packets)
    #[inline]
    pub fn first_byte(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// Total wire length, header included
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        PacketHeader::SIZE + self.payload.len()
    }

    pub fn sequence_id(&self) -> u8 {
        self.header.sequence_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_decode_splits_length() {
        // low = 0x0201, high = 0x03 -> 0x030201
        let header = PacketHeader::decode(&[0x01, 0x02, 0x03, 0x07]).unwrap();
        assert_eq!(header.payload_length, 0x0003_0201);
        assert_eq!(header.sequence_id, 7);
        assert_eq!(header.full_length(), 4 + 0x0003_0201);
    }

    #[test]
    fn test_header_decode_ignores_trailing_bytes() {
        let header = PacketHeader::decode(&[0x05, 0x00, 0x00, 0x00, 0xAA, 0xBB]).unwrap();
        assert_eq!(header.payload_length, 5);
        assert_eq!(header.sequence_id, 0);
    }

    #[test]
    fn test_header_truncated() {
        for len in 0..PacketHeader::SIZE {
            let bytes = vec![0u8; len];
            match PacketHeader::decode(&bytes) {
                Err(ProtocolError::TruncatedHeader { available }) => assert_eq!(available, len),
                other => panic!("expected truncated header, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_header_max_length() {
        let header = PacketHeader::new(MAX_PAYLOAD_LENGTH as u32, 255);
        assert_eq!(header.to_bytes(), [0xFF, 0xFF, 0xFF, 0xFF]);
        let decoded = PacketHeader::decode(&header.to_bytes()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_new_masks_wide_lengths() {
        let header = PacketHeader::new(0x0100_0001, 0);
        assert_eq!(header.payload_length, 1);
    }

    #[test]
    fn test_packet_from_bytes_truncated_payload() {
        let bytes = [0x05, 0x00, 0x00, 0x00, b'a', b'b'];
        match Packet::from_bytes(&bytes) {
            Err(ProtocolError::TruncatedPayload {
                expected,
                available,
            }) => {
                assert_eq!(expected, 5);
                assert_eq!(available, 2);
            }
            other => panic!("expected truncated payload, got {other:?}"),
        }
    }

    #[test]
    fn test_packet_to_bytes() {
        let packet = Packet::new(3, &b"\x03SELECT 1"[..]).unwrap();
        let bytes = packet.to_bytes();
        assert_eq!(&bytes[..4], &[9, 0, 0, 3]);
        assert_eq!(Packet::from_bytes(&bytes).unwrap(), packet);
        assert_eq!(packet.len(), 13);
        assert_eq!(packet.first_byte(), Some(0x03));
    }

    #[test]
    fn test_empty_payload() {
        let packet = Packet::new(0, Bytes::new()).unwrap();
        assert_eq!(packet.to_bytes(), vec![0, 0, 0, 0]);
        assert_eq!(packet.first_byte(), None);
    }
}
