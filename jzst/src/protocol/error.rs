use thiserror::Error;

/// Errors that may occur while encoding control messages or frame packets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Control payload of {0} bytes exceeds the 65535 byte limit.")]
    PayloadTooLarge(usize),
    #[error("Encoded control message of {0} bytes does not fit a stream frame.")]
    StreamFrameTooLarge(usize),
    #[error("Frame of {0} bytes needs more than 65535 chunks.")]
    TooManyChunks(usize),
}

/// Errors that may occur while decoding control messages, frame packets and
/// their payloads.
///
/// Every variant is a framing error: fatal to the single message (or the
/// connection carrying it), never to the loop that received it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer did not contain enough bytes for the fixed header.
    #[error("Unexpected EoF, not enough bytes to read requested type.")]
    UnexpectedEof,
    #[error("Invalid magic value: {0:#010x}")]
    InvalidMagic(u32),
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),
    #[error("Unknown message type: {0:#04x}")]
    UnknownMessageType(u8),
    #[error("Declared payload length {declared} exceeds the {available} bytes available.")]
    PayloadTruncated { declared: usize, available: usize },
    #[error("{0} trailing bytes after control message payload.")]
    TrailingBytes(usize),
    /// A stream length prefix outside `[0, 65536)`.
    #[error("Invalid stream frame length: {0}")]
    InvalidFrameLength(i32),
    #[error("Invalid stream config: {0}")]
    InvalidStreamConfig(String),
    #[error("Invalid discovery beacon payload.")]
    InvalidBeacon,
    #[error("Invalid auth response code: {0}")]
    InvalidAuthStatus(u8),
    #[error("Chunk index {index} out of range for {total} chunks.")]
    ChunkIndexOutOfRange { index: u16, total: u16 },
    #[error("Frame declared zero chunks.")]
    ZeroChunks,
    #[error("Chunk count didn't match the open frame buffer.")]
    ChunkCountMismatch,
    #[error("Frame reassembly buffer full.")]
    ReassemblyBufferFull,
}
