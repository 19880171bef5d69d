//! Peer-to-peer streaming core for jizhi-stream.
//!
//! Two peers on a LAN find each other through [`discovery`], authenticate
//! over the [`control`] channel with a shared secret, and then move frames
//! over UDP with [`transport`], which splits each frame into datagram-sized
//! chunks and reassembles them on the other side.
//!
//! ## Example: Host
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jzst::auth::AuthManager;
//! use jzst::control::{ControlConnection, ControlServer, ControlServerConfig};
//! use jzst::protocol::StreamConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let auth = Arc::new(AuthManager::new("jz2024"));
//!     let server = ControlServer::bind(
//!         ControlServerConfig::default(),
//!         auth,
//!         |config: StreamConfig, conn: ControlConnection| {
//!             println!("{} wants {}", conn.peer_addr(), config);
//!         },
//!     )
//!     .await?;
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     server.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Example: Viewer
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use jzst::auth::AuthManager;
//! use jzst::control::ControlClient;
//! use jzst::protocol::StreamConfig;
//! use jzst::transport::{FrameReceiver, FrameReceiverConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let _receiver = FrameReceiver::bind(FrameReceiverConfig::default(), |frame: Bytes, ts: u64| {
//!         println!("frame of {} bytes at {}", frame.len(), ts);
//!     })
//!     .await?;
//!
//!     let mut client = ControlClient::new(Arc::new(AuthManager::new("jz2024")));
//!     if client.connect("192.168.1.20:23333".parse()?).await {
//!         client.request_stream(&StreamConfig::default()).await;
//!     }
//!     Ok(())
//! }
//! ```
pub mod auth;
pub mod builders;
pub mod control;
pub mod discovery;
pub mod error;
mod net;
pub mod protocol;
pub mod session;
pub mod transport;

pub use auth::AuthManager;
pub use control::{ControlClient, ControlServer};
pub use discovery::DiscoveryService;
pub use error::JzstError;
pub use session::StreamSession;
pub use transport::{FrameReceiver, FrameSender};
