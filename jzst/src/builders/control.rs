use std::net::SocketAddr;
use std::time::Duration;

use crate::control::{ControlClientConfig, ControlServerConfig};

/// Configuration builder for [`crate::control::ControlServer`].
#[derive(Debug, Clone)]
pub struct ControlServerConfigBuilder {
    bind_addr: SocketAddr,
    auth_timeout: Duration,
}

impl Default for ControlServerConfigBuilder {
    fn default() -> Self {
        let config = ControlServerConfig::default();
        Self {
            bind_addr: config.bind_addr,
            auth_timeout: config.auth_timeout,
        }
    }
}

impl From<ControlServerConfigBuilder> for ControlServerConfig {
    fn from(builder: ControlServerConfigBuilder) -> Self {
        builder.build()
    }
}

impl ControlServerConfigBuilder {
    /// Creates a new [`ControlServerConfigBuilder`] with default values.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bind_addr(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    #[must_use]
    /// Sets how long a peer has to answer the auth challenge.
    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    pub fn build(self) -> ControlServerConfig {
        ControlServerConfig {
            bind_addr: self.bind_addr,
            auth_timeout: self.auth_timeout,
        }
    }
}

/// Configuration builder for [`crate::control::ControlClient`].
#[derive(Debug, Clone)]
pub struct ControlClientConfigBuilder {
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl Default for ControlClientConfigBuilder {
    fn default() -> Self {
        let config = ControlClientConfig::default();
        Self {
            connect_timeout: config.connect_timeout,
            io_timeout: config.io_timeout,
        }
    }
}

impl From<ControlClientConfigBuilder> for ControlClientConfig {
    fn from(builder: ControlClientConfigBuilder) -> Self {
        builder.build()
    }
}

impl ControlClientConfigBuilder {
    /// Creates a new [`ControlClientConfigBuilder`] with default values.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    /// Sets the TCP connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    /// Sets the timeout for each handshake read and heartbeat echo.
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn build(self) -> ControlClientConfig {
        ControlClientConfig {
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
        }
    }
}
