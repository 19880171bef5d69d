use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::assembler::FrameAssembler;
use crate::builders::FrameReceiverConfigBuilder;
use crate::error::Result;
use crate::net::{UdpOptions, bind_udp};
use crate::protocol::FramePacket;
use crate::protocol::constants::{
    FRAME_SOCKET_BUFFER_SIZE, FRAME_TIMEOUT, MAX_DATAGRAM_SIZE, STREAM_PORT, SWEEP_INTERVAL,
};

/// Consumer of reassembled frames.
pub trait FrameHandler: Send + Sync + 'static {
    /// Called once per completed frame with its bytes and sender timestamp.
    fn on_frame(&self, frame: Bytes, timestamp: u64);
}

impl<F> FrameHandler for F
where
    F: Fn(Bytes, u64) + Send + Sync + 'static,
{
    fn on_frame(&self, frame: Bytes, timestamp: u64) {
        self(frame, timestamp)
    }
}

/// Configuration for a [`FrameReceiver`].
#[derive(Debug, Clone)]
pub struct FrameReceiverConfig {
    /// Address the frame socket binds to.
    pub bind_addr: SocketAddr,
    /// Requested socket receive buffer. Burst loss is the main risk, so this is large.
    pub recv_buffer_size: usize,
    /// Age after which an incomplete frame is dropped.
    pub frame_timeout: Duration,
    /// How often stale frames are swept.
    pub sweep_interval: Duration,
    /// Maximum number of frames reassembled at once.
    pub max_pending_frames: usize,
    /// Largest datagram accepted.
    pub max_datagram_size: usize,
}

impl Default for FrameReceiverConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, STREAM_PORT)),
            recv_buffer_size: FRAME_SOCKET_BUFFER_SIZE,
            frame_timeout: FRAME_TIMEOUT,
            sweep_interval: SWEEP_INTERVAL,
            max_pending_frames: 256,
            max_datagram_size: MAX_DATAGRAM_SIZE,
        }
    }
}

impl FrameReceiverConfig {
    pub fn builder() -> FrameReceiverConfigBuilder {
        FrameReceiverConfigBuilder::new()
    }
}

/// Receives chunk datagrams and hands complete frames to a [`FrameHandler`].
///
/// Assumes a single logical sender: frame ids from different senders would
/// share one reassembly table.
pub struct FrameReceiver {
    local_addr: SocketAddr,
    assembler: Arc<Mutex<FrameAssembler>>,
    running: Arc<AtomicBool>,
    cancel_token: CancellationToken,
    _receive_task: JoinHandle<()>,
    _sweep_task: JoinHandle<()>,
}

impl FrameReceiver {
    /// Binds the frame socket and starts the receive and sweep loops.
    pub async fn bind(config: FrameReceiverConfig, handler: impl FrameHandler) -> Result<Self> {
        let socket = bind_udp(
            config.bind_addr,
            UdpOptions {
                reuse_address: true,
                recv_buffer_size: Some(config.recv_buffer_size),
                ..Default::default()
            },
        )?;
        let local_addr = socket.local_addr()?;
        let assembler = Arc::new(Mutex::new(FrameAssembler::new(
            config.frame_timeout,
            config.max_pending_frames,
        )));
        let running = Arc::new(AtomicBool::new(true));
        let cancel_token = CancellationToken::new();

        let receive_task = tokio::spawn(receive_loop(
            socket,
            // Never smaller than a full UDP payload, so oversized datagrams are not truncated.
            config.max_datagram_size.max(u16::MAX as usize),
            assembler.clone(),
            Arc::new(handler),
            running.clone(),
            cancel_token.clone(),
        ));
        let sweep_task = tokio::spawn(sweep_loop(
            assembler.clone(),
            config.sweep_interval,
            cancel_token.clone(),
        ));

        tracing::debug!(%local_addr, "frame receiver bound");

        Ok(Self {
            local_addr,
            assembler,
            running,
            cancel_token,
            _receive_task: receive_task,
            _sweep_task: sweep_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of frames currently waiting for chunks.
    pub fn pending_frames(&self) -> usize {
        self.assembler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stops both loops; the socket closes once the receive loop exits.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.cancel_token.cancel();
    }
}

impl Drop for FrameReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn receive_loop<H: FrameHandler>(
    socket: UdpSocket,
    buf_size: usize,
    assembler: Arc<Mutex<FrameAssembler>>,
    handler: Arc<H>,
    running: Arc<AtomicBool>,
    cancel_token: CancellationToken,
) {
    let mut buf = vec![0u8; buf_size];

    loop {
        let (len, peer) = tokio::select! {
            _ = cancel_token.cancelled() => {
                tracing::debug!("frame receiver cancelled");
                break;
            }
            res = socket.recv_from(&mut buf) => match res {
                Ok(received) => received,
                Err(e) => {
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    if e.kind() != std::io::ErrorKind::ConnectionReset {
                        tracing::debug!("frame receive error: {}", e);
                    }
                    continue;
                }
            }
        };

        let packet = match FramePacket::decode(Bytes::copy_from_slice(&buf[..len])) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::trace!(%peer, "dropping malformed datagram: {}", e);
                continue;
            }
        };
        let frame_id = packet.frame_id;

        let completed = {
            let mut assembler = assembler.lock().unwrap_or_else(|e| e.into_inner());
            assembler.add(packet, now())
        };

        match completed {
            Ok(Some(frame)) => handler.on_frame(frame.data, frame.timestamp),
            Ok(None) => {}
            Err(e) => tracing::trace!(%peer, frame_id, "dropping chunk: {}", e),
        }
    }
}

/// Reassembly clock. Read through tokio so a paused runtime controls ageing.
fn now() -> std::time::Instant {
    time::Instant::now().into_std()
}

async fn sweep_loop(
    assembler: Arc<Mutex<FrameAssembler>>,
    period: Duration,
    cancel_token: CancellationToken,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = interval.tick() => {
                let dropped = assembler
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .prune(now());
                if dropped > 0 {
                    tracing::debug!(dropped, "swept stale frames");
                }
            }
        }
    }
}
