//! Control messages: `[magic:4][version:1][type:1][payloadLen:2][payload]`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::{CONTROL_HEADER_SIZE, MAGIC, MAX_CONTROL_PAYLOAD, PROTOCOL_VERSION};
use super::error::{DecodeError, EncodeError};
use super::stream_config::StreamConfig;

/// Type code of a control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Discover = 0x01,
    DiscoverReply = 0x02,
    AuthRequest = 0x10,
    AuthResponse = 0x11,
    StartStream = 0x20,
    StopStream = 0x21,
    Config = 0x30,
    Heartbeat = 0x40,
    /// Reserved, never produced by this crate.
    InputEvent = 0x50,
}

impl TryFrom<u8> for MessageType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => MessageType::Discover,
            0x02 => MessageType::DiscoverReply,
            0x10 => MessageType::AuthRequest,
            0x11 => MessageType::AuthResponse,
            0x20 => MessageType::StartStream,
            0x21 => MessageType::StopStream,
            0x30 => MessageType::Config,
            0x40 => MessageType::Heartbeat,
            0x50 => MessageType::InputEvent,
            other => return Err(DecodeError::UnknownMessageType(other)),
        })
    }
}

impl From<MessageType> for u8 {
    fn from(kind: MessageType) -> Self {
        kind as u8
    }
}

/// Single-byte payload of an `AuthResponse` sent by the accepting side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthStatus {
    Ok = 0,
    Fail = 1,
    Locked = 2,
}

impl TryFrom<u8> for AuthStatus {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AuthStatus::Ok),
            1 => Ok(AuthStatus::Fail),
            2 => Ok(AuthStatus::Locked),
            other => Err(DecodeError::InvalidAuthStatus(other)),
        }
    }
}

/// A typed control message with an opaque payload of at most 65535 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    kind: MessageType,
    payload: Bytes,
}

impl ControlMessage {
    /// Creates a message, refusing payloads the 16-bit length field can't describe.
    pub fn new(kind: MessageType, payload: impl Into<Bytes>) -> Result<Self, EncodeError> {
        let payload = payload.into();
        if payload.len() > MAX_CONTROL_PAYLOAD {
            return Err(EncodeError::PayloadTooLarge(payload.len()));
        }
        Ok(Self { kind, payload })
    }

    /// Creates a message with an empty payload.
    pub fn empty(kind: MessageType) -> Self {
        Self {
            kind,
            payload: Bytes::new(),
        }
    }

    /// AUTH_REQUEST carrying the accepting side's challenge.
    pub fn auth_request(challenge: &[u8]) -> Result<Self, EncodeError> {
        Self::new(MessageType::AuthRequest, Bytes::copy_from_slice(challenge))
    }

    /// AUTH_RESPONSE carrying the connecting side's digest.
    pub fn auth_response(response: &[u8]) -> Result<Self, EncodeError> {
        Self::new(MessageType::AuthResponse, Bytes::copy_from_slice(response))
    }

    /// AUTH_RESPONSE carrying the one-byte verdict of the accepting side.
    pub fn auth_status(status: AuthStatus) -> Self {
        Self {
            kind: MessageType::AuthResponse,
            payload: Bytes::copy_from_slice(&[status as u8]),
        }
    }

    /// START_STREAM carrying `config` in its text form.
    pub fn start_stream(config: &StreamConfig) -> Result<Self, EncodeError> {
        Self::new(MessageType::StartStream, config.encode())
    }

    /// Type code of the message.
    pub fn kind(&self) -> MessageType {
        self.kind
    }

    /// Raw payload, at most 65535 bytes.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consumes the message, returning its payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Reads the status byte of an `AuthResponse` sent by the accepting side.
    pub fn status(&self) -> Result<AuthStatus, DecodeError> {
        match self.payload.first() {
            Some(&code) => AuthStatus::try_from(code),
            None => Err(DecodeError::UnexpectedEof),
        }
    }

    /// Number of bytes [`ControlMessage::encode`] writes.
    pub fn encoded_len(&self) -> usize {
        CONTROL_HEADER_SIZE + self.payload.len()
    }

    /// Writes the header and payload into `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u32(MAGIC);
        dst.put_u8(PROTOCOL_VERSION);
        dst.put_u8(self.kind.into());
        // Length is bounded by the constructor.
        dst.put_u16(self.payload.len() as u16);
        dst.put_slice(&self.payload);
    }

    /// Encodes into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decodes exactly one message occupying all of `src`.
    pub fn decode(mut src: &[u8]) -> Result<Self, DecodeError> {
        if src.len() < CONTROL_HEADER_SIZE {
            return Err(DecodeError::UnexpectedEof);
        }
        let magic = src.get_u32();
        if magic != MAGIC {
            return Err(DecodeError::InvalidMagic(magic));
        }
        let version = src.get_u8();
        if version != PROTOCOL_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let kind = MessageType::try_from(src.get_u8())?;
        let declared = src.get_u16() as usize;
        if declared > src.len() {
            return Err(DecodeError::PayloadTruncated {
                declared,
                available: src.len(),
            });
        }
        if declared < src.len() {
            return Err(DecodeError::TrailingBytes(src.len() - declared));
        }
        Ok(Self {
            kind,
            payload: Bytes::copy_from_slice(src),
        })
    }
}
