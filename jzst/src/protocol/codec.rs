use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::JzstError;
use crate::protocol::{
    constants::{MAX_STREAM_FRAME_LEN, STREAM_LENGTH_PREFIX_SIZE},
    error::{DecodeError, EncodeError},
    message::ControlMessage,
};

/// A codec for control messages carried over the ordered control stream.
///
/// Each encoded [`ControlMessage`] is prefixed with its length as a 4-byte
/// big-endian signed integer. A prefix outside `[0, 65536)` is a fatal
/// framing error for the connection. Use with [`tokio_util::codec::Framed`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ControlCodec;

impl Decoder for ControlCodec {
    type Item = ControlMessage;
    type Error = JzstError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < STREAM_LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let declared = i32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        let len = usize::try_from(declared)
            .ok()
            .filter(|len| *len < MAX_STREAM_FRAME_LEN)
            .ok_or(DecodeError::InvalidFrameLength(declared))?;

        if src.len() < STREAM_LENGTH_PREFIX_SIZE + len {
            src.reserve(STREAM_LENGTH_PREFIX_SIZE + len - src.len());
            return Ok(None);
        }

        src.advance(STREAM_LENGTH_PREFIX_SIZE);
        let frame = src.split_to(len);
        Ok(Some(ControlMessage::decode(&frame)?))
    }
}

impl Encoder<ControlMessage> for ControlCodec {
    type Error = JzstError;

    fn encode(&mut self, item: ControlMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let len = item.encoded_len();
        if len >= MAX_STREAM_FRAME_LEN {
            return Err(EncodeError::StreamFrameTooLarge(len).into());
        }
        dst.reserve(STREAM_LENGTH_PREFIX_SIZE + len);
        dst.put_i32(len as i32);
        item.encode(dst);
        Ok(())
    }
}
