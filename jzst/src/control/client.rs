use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use super::connection::read_message;
use crate::auth::AuthManager;
use crate::builders::ControlClientConfigBuilder;
use crate::discovery::DeviceInfo;
use crate::error::{JzstError, Result};
use crate::protocol::{AuthStatus, ControlCodec, ControlMessage, MessageType, StreamConfig};

/// Configuration for a [`ControlClient`].
#[derive(Debug, Clone)]
pub struct ControlClientConfig {
    pub connect_timeout: Duration,
    /// Applied to every handshake read and to heartbeat echoes.
    pub io_timeout: Duration,
}

impl Default for ControlClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            io_timeout: Duration::from_secs(10),
        }
    }
}

impl ControlClientConfig {
    pub fn builder() -> ControlClientConfigBuilder {
        ControlClientConfigBuilder::new()
    }
}

/// Connecting side of the control channel.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use jzst::auth::AuthManager;
/// # use jzst::control::ControlClient;
/// # use jzst::protocol::StreamConfig;
/// # async fn run() {
/// let auth = Arc::new(AuthManager::new("jz2024"));
/// let mut client = ControlClient::new(auth);
/// if client.connect("192.168.1.20:23333".parse().unwrap()).await {
///     client.request_stream(&StreamConfig::default()).await;
/// }
/// # }
/// ```
pub struct ControlClient {
    auth: Arc<AuthManager>,
    config: ControlClientConfig,
    framed: Option<Framed<TcpStream, ControlCodec>>,
    peer_addr: Option<SocketAddr>,
}

impl ControlClient {
    /// Creates a disconnected client with default timeouts.
    pub fn new(auth: Arc<AuthManager>) -> Self {
        Self::with_config(auth, ControlClientConfig::default())
    }

    /// Creates a disconnected client with the given timeouts.
    pub fn with_config(auth: Arc<AuthManager>, config: ControlClientConfig) -> Self {
        Self {
            auth,
            config,
            framed: None,
            peer_addr: None,
        }
    }

    /// Connects and answers the auth challenge.
    ///
    /// Returns `true` only once the server reports success. Any previous
    /// connection is dropped first.
    pub async fn connect(&mut self, addr: SocketAddr) -> bool {
        self.disconnect().await;
        match self.handshake(addr).await {
            Ok(framed) => {
                tracing::debug!(peer = %addr, "control connection authenticated");
                self.framed = Some(framed);
                self.peer_addr = Some(addr);
                true
            }
            Err(e) => {
                tracing::warn!(peer = %addr, "control connect failed: {}", e);
                false
            }
        }
    }

    /// Connects to a discovered device's control port.
    pub async fn connect_device(&mut self, device: &DeviceInfo) -> bool {
        self.connect(SocketAddr::new(device.ip, device.control_port))
            .await
    }

    async fn handshake(&self, addr: SocketAddr) -> Result<Framed<TcpStream, ControlCodec>> {
        let stream = timeout(self.config.connect_timeout, TcpStream::connect(addr)).await??;
        stream.set_nodelay(true)?;
        let mut framed = Framed::new(stream, ControlCodec);

        let challenge = timeout(self.config.io_timeout, read_message(&mut framed)).await??;
        match challenge.kind() {
            MessageType::AuthRequest => {}
            // A locked-out peer gets its status instead of a challenge.
            MessageType::AuthResponse => return Err(JzstError::AuthRejected(challenge.status()?)),
            other => return Err(JzstError::UnexpectedMessage(other)),
        }

        let response = self.auth.compute_response(challenge.payload());
        framed.send(ControlMessage::auth_response(&response)?).await?;

        let result = timeout(self.config.io_timeout, read_message(&mut framed)).await??;
        if result.kind() != MessageType::AuthResponse {
            return Err(JzstError::UnexpectedMessage(result.kind()));
        }
        match result.status()? {
            AuthStatus::Ok => Ok(framed),
            status => Err(JzstError::AuthRejected(status)),
        }
    }

    /// Whether an authenticated connection is open.
    ///
    /// Becomes `false` after a failed send or receive.
    pub fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    /// Address of the server, while connected.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Asks the server to start streaming with `config`.
    pub async fn request_stream(&mut self, config: &StreamConfig) -> bool {
        match ControlMessage::start_stream(config) {
            Ok(msg) => self.send(msg).await,
            Err(e) => {
                tracing::warn!("stream config not sendable: {}", e);
                false
            }
        }
    }

    /// Asks the server to stop streaming. The server then closes the connection.
    pub async fn stop_stream(&mut self) -> bool {
        self.send(ControlMessage::empty(MessageType::StopStream))
            .await
    }

    /// Sends a HEARTBEAT and waits for the server's echo.
    pub async fn heartbeat(&mut self) -> bool {
        if !self
            .send(ControlMessage::empty(MessageType::Heartbeat))
            .await
        {
            return false;
        }
        let io_timeout = self.config.io_timeout;
        let Some(framed) = self.framed.as_mut() else {
            return false;
        };
        match timeout(io_timeout, read_message(framed)).await {
            Ok(Ok(msg)) if msg.kind() == MessageType::Heartbeat => true,
            Ok(Ok(msg)) => {
                tracing::debug!(kind = ?msg.kind(), "expected heartbeat echo");
                false
            }
            Ok(Err(e)) => {
                tracing::debug!("heartbeat failed: {}", e);
                self.framed = None;
                false
            }
            Err(_) => {
                tracing::debug!("heartbeat timed out");
                false
            }
        }
    }

    /// Sends a raw message on the authenticated channel.
    pub async fn send(&mut self, msg: ControlMessage) -> bool {
        let Some(framed) = self.framed.as_mut() else {
            return false;
        };
        match framed.send(msg).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("control send failed: {}", e);
                self.framed = None;
                false
            }
        }
    }

    /// Reads the next message. `None` once the connection is gone.
    pub async fn recv(&mut self) -> Option<ControlMessage> {
        let framed = self.framed.as_mut()?;
        match read_message(framed).await {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::debug!("control receive ended: {}", e);
                self.framed = None;
                None
            }
        }
    }

    /// The authenticated, ordered message channel, for callers that want
    /// to drive it directly as a `Stream` + `Sink`.
    pub fn channel(&mut self) -> Option<&mut Framed<TcpStream, ControlCodec>> {
        self.framed.as_mut()
    }

    /// Closes the connection, if any. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        if let Some(mut framed) = self.framed.take() {
            let _ = SinkExt::<ControlMessage>::close(&mut framed).await;
        }
        self.peer_addr = None;
    }
}
