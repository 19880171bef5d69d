//! Frame packets: `[frameId:4][chunkIndex:2][totalChunks:2][timestamp:8][data:rest]`.
//!
//! There is no length field; the datagram boundary delimits the chunk data.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::FRAME_HEADER_SIZE;
use super::error::{DecodeError, EncodeError};

/// One chunk of a frame, carried in one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePacket {
    pub frame_id: u32,
    pub chunk_index: u16,
    pub total_chunks: u16,
    /// Sender-side monotonic capture time in nanoseconds.
    pub timestamp: u64,
    pub data: Bytes,
}

impl FramePacket {
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.data.len()
    }

    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u32(self.frame_id);
        dst.put_u16(self.chunk_index);
        dst.put_u16(self.total_chunks);
        dst.put_u64(self.timestamp);
        dst.put_slice(&self.data);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decodes a datagram; everything after the header is chunk data.
    pub fn decode(mut src: Bytes) -> Result<Self, DecodeError> {
        if src.len() < FRAME_HEADER_SIZE {
            return Err(DecodeError::UnexpectedEof);
        }
        let frame_id = src.get_u32();
        let chunk_index = src.get_u16();
        let total_chunks = src.get_u16();
        let timestamp = src.get_u64();
        Ok(Self {
            frame_id,
            chunk_index,
            total_chunks,
            timestamp,
            data: src,
        })
    }
}

/// Splits `frame` into packets carrying at most `max_chunk_payload` bytes each.
///
/// All packets share `frame_id`, `timestamp` and `total_chunks`. An empty
/// frame yields no packets.
pub fn split_frame(
    frame_id: u32,
    timestamp: u64,
    frame: &Bytes,
    max_chunk_payload: usize,
) -> Result<Vec<FramePacket>, EncodeError> {
    let max_chunk_payload = max_chunk_payload.max(1);
    let total = frame.len().div_ceil(max_chunk_payload);
    let total_chunks = u16::try_from(total).map_err(|_| EncodeError::TooManyChunks(frame.len()))?;

    Ok((0..total)
        .map(|index| {
            let start = index * max_chunk_payload;
            let end = (start + max_chunk_payload).min(frame.len());
            FramePacket {
                frame_id,
                chunk_index: index as u16,
                total_chunks,
                timestamp,
                data: frame.slice(start..end),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_big_endian() {
        let packet = FramePacket {
            frame_id: 0x0102_0304,
            chunk_index: 2,
            total_chunks: 3,
            timestamp: 0x1122_3344_5566_7788,
            data: Bytes::from_static(b"xy"),
        };
        assert_eq!(
            packet.to_bytes().as_ref(),
            &[
                1, 2, 3, 4, 0, 2, 0, 3, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, b'x', b'y'
            ]
        );
        assert_eq!(FramePacket::decode(packet.to_bytes()).unwrap(), packet);
    }

    #[test]
    fn header_only_datagram_has_empty_data() {
        let decoded = FramePacket::decode(Bytes::from(vec![0u8; FRAME_HEADER_SIZE])).unwrap();
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn rejects_short_datagram() {
        assert_eq!(
            FramePacket::decode(Bytes::from(vec![0u8; FRAME_HEADER_SIZE - 1])),
            Err(DecodeError::UnexpectedEof)
        );
    }

    #[test]
    fn split_covers_frame_in_order() {
        let frame = Bytes::from((0..=255u8).cycle().take(1000).collect::<Vec<_>>());
        let packets = split_frame(7, 99, &frame, 300).unwrap();

        assert_eq!(packets.len(), 4);
        assert!(packets.iter().all(|p| p.total_chunks == 4 && p.frame_id == 7));
        assert_eq!(packets[3].data.len(), 100);

        let joined: Vec<u8> = packets.iter().flat_map(|p| p.data.iter().copied()).collect();
        assert_eq!(joined, frame.as_ref());
    }

    #[test]
    fn split_exact_multiple_and_empty() {
        let frame = Bytes::from(vec![1u8; 600]);
        assert_eq!(split_frame(0, 0, &frame, 300).unwrap().len(), 2);
        assert!(split_frame(0, 0, &Bytes::new(), 300).unwrap().is_empty());
    }

    #[test]
    fn split_refuses_more_than_u16_chunks() {
        let frame = Bytes::from(vec![0u8; 65536]);
        assert_eq!(
            split_frame(0, 0, &frame, 1),
            Err(EncodeError::TooManyChunks(65536))
        );
    }
}
