use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::packet::{Packet, PacketHeader};
use crate::error::{ProtocolError, Result};

/// Framing codec for logical packets.
///
/// Decoding splits complete packets off the front of the buffer without copying
/// the payload. A partial header or payload yields `None` and leaves the buffer
/// untouched; truncation is never reported as an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct PacketCodec;

impl PacketCodec {
    /// Declared length of the packet at the front of `src`, if its header is complete
    #[inline]
    pub fn peek_length(src: &[u8]) -> Option<usize> {
        PacketHeader::decode(src).ok().map(|h| h.full_length())
    }

    /// Split one complete packet off `src`
    pub fn decode_frame(&self, src: &mut BytesMut) -> Option<Packet> {
        let header = PacketHeader::decode(src).ok()?;
        let total = header.full_length();
        if src.len() < total {
            return None;
        }

        let mut frame = src.split_to(total);
        frame.advance(PacketHeader::SIZE);

        Some(Packet {
            header,
            payload: frame.freeze(),
        })
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        Ok(self.decode_frame(src))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<()> {
        dst.reserve(item.len());
        item.header.encode(dst);
        dst.extend_from_slice(&item.payload);
        Ok(())
    }
}
