use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use tokio::net::UdpSocket;

use crate::builders::FrameSenderConfigBuilder;
use crate::error::Result;
use crate::net::{UdpOptions, bind_udp};
use crate::protocol::constants::{FRAME_HEADER_SIZE, FRAME_SOCKET_BUFFER_SIZE, MAX_DATAGRAM_SIZE};
use crate::protocol::split_frame;

/// Configuration for a [`FrameSender`].
#[derive(Debug, Clone)]
pub struct FrameSenderConfig {
    /// Where every chunk is sent.
    pub target: SocketAddr,
    /// Local address; `None` binds an ephemeral port of the target's family.
    pub bind_addr: Option<SocketAddr>,
    /// Largest datagram emitted, header included.
    pub max_datagram_size: usize,
    /// Requested socket send buffer.
    pub send_buffer_size: usize,
}

impl FrameSenderConfig {
    pub fn new(target: SocketAddr) -> Self {
        Self {
            target,
            bind_addr: None,
            max_datagram_size: MAX_DATAGRAM_SIZE,
            send_buffer_size: FRAME_SOCKET_BUFFER_SIZE,
        }
    }

    pub fn builder() -> FrameSenderConfigBuilder {
        FrameSenderConfigBuilder::new()
    }

    fn local_addr(&self) -> SocketAddr {
        self.bind_addr.unwrap_or_else(|| {
            let ip = match self.target.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            };
            SocketAddr::new(ip, 0)
        })
    }
}

/// Best-effort chunked frame sender.
///
/// Each frame gets the next id from a per-sender counter (wrapping at
/// `u32::MAX`) and a capture timestamp in nanoseconds since the sender was
/// created. Chunks are sent independently; failures are neither retried nor
/// reported.
pub struct FrameSender {
    // Taken by `stop`; the socket closes once in-flight sends finish.
    socket: Mutex<Option<Arc<UdpSocket>>>,
    target: SocketAddr,
    max_chunk_payload: usize,
    next_frame_id: AtomicU32,
    epoch: Instant,
}

impl FrameSender {
    pub async fn bind(config: FrameSenderConfig) -> Result<Self> {
        let socket = bind_udp(
            config.local_addr(),
            UdpOptions {
                send_buffer_size: Some(config.send_buffer_size),
                ..Default::default()
            },
        )?;
        let max_chunk_payload = config
            .max_datagram_size
            .saturating_sub(FRAME_HEADER_SIZE)
            .max(1);

        tracing::debug!(target = %config.target, max_chunk_payload, "frame sender bound");

        Ok(Self {
            socket: Mutex::new(Some(Arc::new(socket))),
            target: config.target,
            max_chunk_payload,
            next_frame_id: AtomicU32::new(0),
            epoch: Instant::now(),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Local address of the socket; fails once the sender is stopped.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        match self.socket() {
            Some(socket) => socket.local_addr(),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "frame sender stopped",
            )),
        }
    }

    pub fn max_chunk_payload(&self) -> usize {
        self.max_chunk_payload
    }

    pub fn is_running(&self) -> bool {
        self.socket().is_some()
    }

    fn socket(&self) -> Option<Arc<UdpSocket>> {
        self.socket.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Splits `frame` into chunks and sends each one to the target.
    ///
    /// Does nothing once stopped, for empty frames, and for frames needing
    /// more than `u16::MAX` chunks.
    pub async fn send_frame(&self, frame: impl Into<Bytes>) {
        let Some(socket) = self.socket() else {
            return;
        };
        let frame = frame.into();
        let frame_id = self.next_frame_id.fetch_add(1, Ordering::Relaxed);
        let timestamp = self.epoch.elapsed().as_nanos() as u64;

        let packets = match split_frame(frame_id, timestamp, &frame, self.max_chunk_payload) {
            Ok(packets) => packets,
            Err(e) => {
                tracing::warn!(frame_id, size = frame.len(), "frame not sent: {}", e);
                return;
            }
        };

        let mut out = BytesMut::with_capacity(self.max_chunk_payload + FRAME_HEADER_SIZE);
        for packet in &packets {
            out.clear();
            packet.encode(&mut out);
            if let Err(e) = socket.send_to(&out, self.target).await {
                tracing::trace!(frame_id, chunk_index = packet.chunk_index, "chunk send failed: {}", e);
            }
        }
    }

    /// Stops the sender and releases its socket; later
    /// [`FrameSender::send_frame`] calls are no-ops.
    pub fn stop(&self) {
        if self
            .socket
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some()
        {
            tracing::debug!(target = %self.target, "frame sender stopped");
        }
    }
}
