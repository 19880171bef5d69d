//! Authenticated TCP control channel on port 23333.
//!
//! Each connection starts with a challenge-response handshake:
//!
//! 1. Server sends AUTH_REQUEST carrying a fresh 32-byte challenge
//! 2. Client answers AUTH_RESPONSE with `SHA-256(challenge || secret)`
//! 3. Server replies AUTH_RESPONSE with a one-byte status (0 ok, 1 fail, 2 locked)
//!
//! After success the client drives the session with START_STREAM,
//! STOP_STREAM and HEARTBEAT.

mod client;
mod connection;
mod server;

pub use client::{ControlClient, ControlClientConfig};
pub use connection::ControlConnection;
pub use server::{ControlServer, ControlServerConfig, SessionHandler};
