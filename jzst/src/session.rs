//! Per-request streaming session on the accepting side.
//!
//! A [`StreamSession`] is built once for each accepted START_STREAM and owns
//! everything that request needs: the capture collaborator, a
//! [`FrameSender`] aimed at the requesting peer, and the task pumping
//! frames between them. Nothing is kept in process-wide state.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::control::ControlConnection;
use crate::error::Result;
use crate::protocol::StreamConfig;
use crate::protocol::constants::{MAX_DATAGRAM_SIZE, STREAM_PORT};
use crate::transport::{FrameSender, FrameSenderConfig};

/// Callback a capture source invokes with each encoded frame.
pub type FrameSink = Box<dyn Fn(Bytes) + Send + Sync>;

/// Producer of encoded frames.
///
/// `on_frame` may be called from any thread and must not block for long.
pub trait ScreenCapture: Send + Sync {
    fn start(&self, width: u32, height: u32, fps: u32, on_frame: FrameSink);
    fn stop(&self);
    fn is_running(&self) -> bool;
}

/// Knobs for [`StreamSession::start`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Frame port on the requesting peer.
    pub stream_port: u16,
    pub max_datagram_size: usize,
    /// Frames buffered between capture and sender before new ones are dropped.
    pub frame_queue: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            stream_port: STREAM_PORT,
            max_datagram_size: MAX_DATAGRAM_SIZE,
            frame_queue: 8,
        }
    }
}

pub struct StreamSession {
    config: StreamConfig,
    peer_addr: SocketAddr,
    capture: Arc<dyn ScreenCapture>,
    sender: Arc<FrameSender>,
    cancel_token: CancellationToken,
    _pump_task: JoinHandle<()>,
}

impl StreamSession {
    /// Starts streaming to the peer behind `connection`.
    pub async fn start(
        capture: Arc<dyn ScreenCapture>,
        config: StreamConfig,
        connection: &ControlConnection,
        options: SessionOptions,
    ) -> Result<Self> {
        let peer_addr = connection.peer_addr();
        let target = SocketAddr::new(peer_addr.ip(), options.stream_port);
        let sender_config = FrameSenderConfig {
            max_datagram_size: options.max_datagram_size,
            ..FrameSenderConfig::new(target)
        };
        let sender = Arc::new(FrameSender::bind(sender_config).await?);

        let (tx, rx) = mpsc::channel::<Bytes>(options.frame_queue.max(1));
        let cancel_token = CancellationToken::new();
        let pump_task = tokio::spawn(pump_frames(rx, sender.clone(), cancel_token.clone()));

        capture.start(
            config.width,
            config.height,
            config.fps,
            Box::new(move |frame: Bytes| {
                if let Err(TrySendError::Full(_)) = tx.try_send(frame) {
                    tracing::trace!("frame queue full, dropping frame");
                }
            }),
        );

        tracing::debug!(peer = %peer_addr, %target, %config, "stream session started");

        Ok(Self {
            config,
            peer_addr,
            capture,
            sender,
            cancel_token,
            _pump_task: pump_task,
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_running(&self) -> bool {
        self.sender.is_running()
    }

    /// Stops capture and the sender. Idempotent.
    pub fn stop(&self) {
        if !self.sender.is_running() {
            return;
        }
        self.capture.stop();
        self.sender.stop();
        self.cancel_token.cancel();
        tracing::debug!(peer = %self.peer_addr, "stream session stopped");
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn pump_frames(
    mut rx: mpsc::Receiver<Bytes>,
    sender: Arc<FrameSender>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            frame = rx.recv() => match frame {
                Some(frame) => sender.send_frame(frame).await,
                None => break,
            }
        }
    }
}
