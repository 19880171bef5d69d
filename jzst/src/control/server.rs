use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use super::connection::{ControlConnection, read_message};
use crate::auth::AuthManager;
use crate::builders::ControlServerConfigBuilder;
use crate::error::{JzstError, Result};
use crate::protocol::constants::CONTROL_PORT;
use crate::protocol::{AuthStatus, ControlCodec, ControlMessage, MessageType, StreamConfig};

/// Receives stream requests from authenticated peers.
///
/// Runs on the connection's task: hand long work off to another task.
pub trait SessionHandler: Send + Sync + 'static {
    fn on_stream_requested(&self, config: StreamConfig, connection: ControlConnection);
}

impl<F> SessionHandler for F
where
    F: Fn(StreamConfig, ControlConnection) + Send + Sync + 'static,
{
    fn on_stream_requested(&self, config: StreamConfig, connection: ControlConnection) {
        self(config, connection)
    }
}

/// Configuration for a [`ControlServer`].
#[derive(Debug, Clone)]
pub struct ControlServerConfig {
    /// Address to accept control connections on.
    pub bind_addr: SocketAddr,
    /// How long a peer has to answer the challenge.
    pub auth_timeout: Duration,
}

impl Default for ControlServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, CONTROL_PORT)),
            auth_timeout: Duration::from_secs(10),
        }
    }
}

impl ControlServerConfig {
    pub fn builder() -> ControlServerConfigBuilder {
        ControlServerConfigBuilder::new()
    }
}

/// Accepting side of the control channel.
///
/// Every connection is served on its own task: the peer is challenged,
/// verified through the [`AuthManager`], and then sends START_STREAM,
/// STOP_STREAM or HEARTBEAT messages until it stops or misbehaves.
pub struct ControlServer {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    cancel_token: CancellationToken,
    _accept_task: JoinHandle<()>,
}

struct Shared {
    auth: Arc<AuthManager>,
    handler: Box<dyn SessionHandler>,
    auth_timeout: Duration,
}

impl ControlServer {
    /// Binds the control listener and starts accepting connections.
    pub async fn bind(
        config: ControlServerConfig,
        auth: Arc<AuthManager>,
        handler: impl SessionHandler,
    ) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let running = Arc::new(AtomicBool::new(true));
        let cancel_token = CancellationToken::new();
        let shared = Arc::new(Shared {
            auth,
            handler: Box::new(handler),
            auth_timeout: config.auth_timeout,
        });

        let accept_task = tokio::spawn(accept_loop(
            listener,
            shared,
            running.clone(),
            cancel_token.clone(),
        ));

        tracing::debug!(%local_addr, "control server listening");

        Ok(Self {
            local_addr,
            running,
            cancel_token,
            _accept_task: accept_task,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether [`ControlServer::stop`] has not been called yet.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stops accepting and ends every open connection.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.cancel_token.cancel();
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                tracing::debug!("control accept loop cancelled");
                break;
            }
            res = listener.accept() => match res {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "control connection accepted");
                    tokio::spawn(handle_connection(
                        stream,
                        peer,
                        shared.clone(),
                        cancel_token.child_token(),
                    ));
                }
                Err(e) => {
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    tracing::debug!("control accept error: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    shared: Arc<Shared>,
    cancel_token: CancellationToken,
) {
    let local_addr = match stream.local_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::debug!(%peer, "dropping connection: {}", e);
            return;
        }
    };
    let _ = stream.set_nodelay(true);
    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, ControlCodec);
    let connection = ControlConnection::new(
        peer,
        local_addr,
        FramedWrite::new(write_half, ControlCodec),
    );

    match serve(&mut reader, &connection, &shared, &cancel_token).await {
        Ok(()) => tracing::debug!(%peer, "control connection finished"),
        Err(e) => tracing::debug!(%peer, "control connection ended: {}", e),
    }
    connection.close().await;
}

async fn serve(
    reader: &mut FramedRead<tokio::net::tcp::OwnedReadHalf, ControlCodec>,
    connection: &ControlConnection,
    shared: &Shared,
    cancel_token: &CancellationToken,
) -> Result<()> {
    let identity = connection.peer_addr().ip();
    let auth = &shared.auth;

    if auth.is_locked(identity) {
        tracing::warn!(%identity, "rejecting locked peer");
        connection
            .send_msg(ControlMessage::auth_status(AuthStatus::Locked))
            .await?;
        return Err(JzstError::AuthRejected(AuthStatus::Locked));
    }

    let challenge = auth.generate_challenge();
    connection
        .send_msg(ControlMessage::auth_request(&challenge)?)
        .await?;

    let reply = tokio::select! {
        _ = cancel_token.cancelled() => return Ok(()),
        reply = timeout(shared.auth_timeout, read_message(reader)) => reply??,
    };
    if reply.kind() != MessageType::AuthResponse {
        return Err(JzstError::UnexpectedMessage(reply.kind()));
    }

    if !auth.verify(&challenge, reply.payload(), identity) {
        let status = if auth.is_locked(identity) {
            AuthStatus::Locked
        } else {
            AuthStatus::Fail
        };
        connection
            .send_msg(ControlMessage::auth_status(status))
            .await?;
        return Err(JzstError::AuthRejected(status));
    }
    connection
        .send_msg(ControlMessage::auth_status(AuthStatus::Ok))
        .await?;
    tracing::debug!(%identity, "peer authenticated");

    loop {
        let msg = tokio::select! {
            _ = cancel_token.cancelled() => return Ok(()),
            msg = read_message(reader) => msg?,
        };

        match msg.kind() {
            MessageType::StartStream => {
                let config = StreamConfig::decode(msg.payload()).unwrap_or_else(|e| {
                    tracing::warn!(%identity, "bad stream config, using defaults: {}", e);
                    StreamConfig::default()
                });
                tracing::debug!(%identity, %config, "stream requested");
                shared
                    .handler
                    .on_stream_requested(config, connection.clone());
            }
            MessageType::StopStream => {
                tracing::debug!(%identity, "stream stop requested");
                return Ok(());
            }
            MessageType::Heartbeat => connection.send_msg(msg).await?,
            other => return Err(JzstError::UnexpectedMessage(other)),
        }
    }
}
