//! Shared protocol-level constants.
//!
//! These values are part of the wire-level contract between peers and must
//! match on both ends of a session.

use std::time::Duration;

// === Ports ===

/// TCP port of the control channel.
pub const CONTROL_PORT: u16 = 23333;
/// UDP port frames are streamed to.
pub const STREAM_PORT: u16 = 23334;
/// UDP port used for broadcast discovery.
pub const DISCOVERY_PORT: u16 = 23335;

// === Control framing ===

/// Magic constant opening every control message ("JZST").
pub const MAGIC: u32 = 0x4A5A_5354;
/// Protocol version carried in every control message.
pub const PROTOCOL_VERSION: u8 = 1;
/// `[magic:4][version:1][type:1][payloadLen:2]`
pub const CONTROL_HEADER_SIZE: usize = 8;
/// Largest payload a single control message can carry.
pub const MAX_CONTROL_PAYLOAD: usize = u16::MAX as usize;
/// Exclusive upper bound of the stream length prefix.
pub const MAX_STREAM_FRAME_LEN: usize = 65536;
/// Size of the big-endian length prefix on the control stream.
pub const STREAM_LENGTH_PREFIX_SIZE: usize = 4;

// === Frame framing ===

/// `[frameId:4][chunkIndex:2][totalChunks:2][timestamp:8]`
pub const FRAME_HEADER_SIZE: usize = 16;
/// Largest datagram the frame sender emits.
pub const MAX_DATAGRAM_SIZE: usize = 65000;
/// Largest chunk payload per datagram.
pub const MAX_CHUNK_PAYLOAD: usize = MAX_DATAGRAM_SIZE - FRAME_HEADER_SIZE;

const _: () = {
    assert!(
        FRAME_HEADER_SIZE < MAX_DATAGRAM_SIZE,
        "frame header must leave room for chunk data"
    );
};

// === Auth ===

/// Size of a challenge issued by the accepting side.
pub const CHALLENGE_SIZE: usize = 32;
/// Size of a SHA-256 challenge response.
pub const RESPONSE_SIZE: usize = 32;
/// Failures within [`LOCKOUT_WINDOW`] that lock an identity.
pub const MAX_AUTH_FAILURES: usize = 5;
/// Sliding window over which auth failures are counted.
pub const LOCKOUT_WINDOW: Duration = Duration::from_millis(60_000);

// === Timing ===

/// Interval between discovery beacons.
pub const BEACON_INTERVAL: Duration = Duration::from_secs(2);
/// Age after which an incomplete frame is discarded.
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(2);
/// Interval of the stale-frame sweep.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1);
/// Socket buffer size requested for the frame sockets.
pub const FRAME_SOCKET_BUFFER_SIZE: usize = 16 * 1024 * 1024;
