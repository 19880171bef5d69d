use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, Stream, StreamExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;

use crate::error::{JzstError, Result};
use crate::protocol::{ControlCodec, ControlMessage};

type ControlWriter = FramedWrite<OwnedWriteHalf, ControlCodec>;

/// Handle to an authenticated control connection on the accepting side.
///
/// Cloning shares the same write half, so the session owner can keep
/// sending while the server task keeps reading. [`ControlConnection::closed`]
/// resolves once the server has finished with the connection, whether the
/// peer sent STOP_STREAM, misbehaved or went away.
#[derive(Clone)]
pub struct ControlConnection {
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    writer: Arc<Mutex<ControlWriter>>,
    closed: CancellationToken,
}

impl std::fmt::Debug for ControlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlConnection")
            .field("peer_addr", &self.peer_addr)
            .field("local_addr", &self.local_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ControlConnection {
    pub(crate) fn new(peer_addr: SocketAddr, local_addr: SocketAddr, writer: ControlWriter) -> Self {
        Self {
            peer_addr,
            local_addr,
            writer: Arc::new(Mutex::new(writer)),
            closed: CancellationToken::new(),
        }
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Local end of the connection.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sends one message; returns whether it was written.
    pub async fn send(&self, msg: ControlMessage) -> bool {
        match self.send_msg(msg).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(peer = %self.peer_addr, "control send failed: {}", e);
                false
            }
        }
    }

    /// Shuts down the write half. The peer sees end of stream.
    pub async fn close(&self) {
        let mut writer = self.writer.lock().await;
        let _ = SinkExt::<ControlMessage>::close(&mut *writer).await;
        self.closed.cancel();
    }

    /// Waits until the connection has been closed by either side.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub(crate) async fn send_msg(&self, msg: ControlMessage) -> Result<()> {
        self.writer.lock().await.send(msg).await
    }
}

/// Reads the next message, treating end of stream as [`JzstError::ConnectionClosed`].
pub(crate) async fn read_message<S>(stream: &mut S) -> Result<ControlMessage>
where
    S: Stream<Item = Result<ControlMessage>> + Unpin,
{
    stream.next().await.ok_or(JzstError::ConnectionClosed)?
}
