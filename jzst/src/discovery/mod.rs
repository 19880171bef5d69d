//! LAN presence discovery over UDP broadcast on port 23335.
//!
//! # Discovery Flow
//!
//! 1. Every peer broadcasts a DISCOVER beacon (`name|platform`) every 2 seconds
//! 2. A peer receiving DISCOVER answers the sender directly with DISCOVER_REPLY
//!    and registers it
//! 3. A peer receiving DISCOVER_REPLY registers the sender without answering
//!
//! Beacons are sent from the listening socket so replies come back to it.

mod beacon;
mod registry;

pub use beacon::Beacon;
pub use registry::{DeviceInfo, DeviceObserver, DeviceRegistry};

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::builders::DiscoveryConfigBuilder;
use crate::error::Result;
use crate::net::{UdpOptions, bind_udp};
use crate::protocol::constants::{BEACON_INTERVAL, DISCOVERY_PORT};
use crate::protocol::{ControlMessage, MessageType};

const RECV_BUFFER_SIZE: usize = 1024;

/// Configuration for a [`DiscoveryService`].
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Address the listening socket binds to.
    pub bind_addr: SocketAddr,
    /// Destination of periodic DISCOVER beacons.
    pub broadcast_addr: SocketAddr,
    /// Time between beacons.
    pub beacon_interval: Duration,
    /// Name announced to other peers.
    pub device_name: String,
    /// Platform announced to other peers.
    pub platform: String,
    /// Allow several processes on one host to share the discovery port.
    pub reuse_port: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DISCOVERY_PORT)),
            broadcast_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, DISCOVERY_PORT)),
            beacon_interval: BEACON_INTERVAL,
            device_name: "JizhiStream".to_string(),
            platform: std::env::consts::OS.to_string(),
            reuse_port: true,
        }
    }
}

impl DiscoveryConfig {
    pub fn builder() -> DiscoveryConfigBuilder {
        DiscoveryConfigBuilder::new()
    }

    fn beacon(&self) -> Beacon {
        Beacon::new(self.device_name.clone(), self.platform.clone())
    }
}

/// Broadcasts presence beacons and tracks the peers that answer.
pub struct DiscoveryService {
    local_addr: SocketAddr,
    registry: Arc<DeviceRegistry>,
    running: Arc<AtomicBool>,
    cancel_token: CancellationToken,
    _listen_task: JoinHandle<()>,
    _beacon_task: JoinHandle<()>,
}

impl DiscoveryService {
    /// Binds the discovery socket and starts the beacon and listen loops.
    ///
    /// `observer` fires once per newly sighted IP; pass `()` to only poll
    /// [`DiscoveryService::devices`].
    pub async fn start(config: DiscoveryConfig, observer: impl DeviceObserver) -> Result<Self> {
        let socket = bind_udp(
            config.bind_addr,
            UdpOptions {
                reuse_address: true,
                reuse_port: config.reuse_port,
                broadcast: true,
                ..Default::default()
            },
        )?;
        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);
        let registry = Arc::new(DeviceRegistry::new(observer));
        let running = Arc::new(AtomicBool::new(true));
        let cancel_token = CancellationToken::new();

        // Payload never changes, so encode it once.
        let beacon = config.beacon();
        let discover = beacon.to_message(MessageType::Discover)?.to_bytes();
        let reply = beacon.to_message(MessageType::DiscoverReply)?.to_bytes();

        let listen_task = tokio::spawn(listen_loop(
            socket.clone(),
            registry.clone(),
            reply,
            running.clone(),
            cancel_token.clone(),
        ));
        let beacon_task = tokio::spawn(beacon_loop(
            socket,
            config.broadcast_addr,
            config.beacon_interval,
            discover,
            cancel_token.clone(),
        ));

        tracing::debug!(%local_addr, name = %config.device_name, "discovery started");

        Ok(Self {
            local_addr,
            registry,
            running,
            cancel_token,
            _listen_task: listen_task,
            _beacon_task: beacon_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Point-in-time snapshot of every known device.
    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stops both loops; the socket closes once they exit.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.cancel_token.cancel();
    }
}

impl Drop for DiscoveryService {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn beacon_loop(
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    period: Duration,
    discover: Bytes,
    cancel_token: CancellationToken,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = interval.tick() => {
                // Best effort: a failed beacon is retried next tick.
                if let Err(e) = socket.send_to(&discover, target).await {
                    tracing::trace!(%target, "beacon send failed: {}", e);
                }
            }
        }
    }
}

async fn listen_loop(
    socket: Arc<UdpSocket>,
    registry: Arc<DeviceRegistry>,
    reply: Bytes,
    running: Arc<AtomicBool>,
    cancel_token: CancellationToken,
) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                tracing::debug!("discovery listener cancelled");
                break;
            }
            res = socket.recv_from(&mut buf) => match res {
                Ok((len, peer)) => {
                    handle_datagram(&socket, &registry, &reply, &buf[..len], peer).await;
                }
                Err(e) => {
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    if e.kind() != std::io::ErrorKind::ConnectionReset {
                        tracing::debug!("discovery receive error: {}", e);
                    }
                }
            }
        }
    }
}

async fn handle_datagram(
    socket: &UdpSocket,
    registry: &DeviceRegistry,
    reply: &Bytes,
    bytes: &[u8],
    peer: SocketAddr,
) {
    let msg = match ControlMessage::decode(bytes) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::trace!(%peer, "dropping discovery datagram: {}", e);
            return;
        }
    };

    let answer = match msg.kind() {
        MessageType::Discover => true,
        MessageType::DiscoverReply => false,
        _ => return,
    };

    let Ok(beacon) = Beacon::decode(msg.payload()) else {
        tracing::trace!(%peer, "dropping malformed beacon");
        return;
    };

    if answer {
        if let Err(e) = socket.send_to(reply, peer).await {
            tracing::trace!(%peer, "discovery reply failed: {}", e);
        }
    }

    registry.register(DeviceInfo::new(beacon.name, peer.ip(), beacon.platform));
}
