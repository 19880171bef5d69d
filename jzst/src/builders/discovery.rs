use std::net::SocketAddr;
use std::time::Duration;

use crate::discovery::DiscoveryConfig;

/// Configuration builder for [`crate::discovery::DiscoveryService`].
#[derive(Debug, Clone)]
pub struct DiscoveryConfigBuilder {
    config: DiscoveryConfig,
}

impl Default for DiscoveryConfigBuilder {
    fn default() -> Self {
        Self {
            config: DiscoveryConfig::default(),
        }
    }
}

impl From<DiscoveryConfigBuilder> for DiscoveryConfig {
    fn from(builder: DiscoveryConfigBuilder) -> Self {
        builder.build()
    }
}

impl DiscoveryConfigBuilder {
    /// Creates a new [`DiscoveryConfigBuilder`] with default values.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    /// Sets the address the listening socket binds to.
    pub fn bind_addr(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    #[must_use]
    /// Sets where beacons are sent. Defaults to the limited broadcast address.
    pub fn broadcast_addr(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.config.broadcast_addr = addr.into();
        self
    }

    #[must_use]
    pub fn beacon_interval(mut self, interval: Duration) -> Self {
        self.config.beacon_interval = interval;
        self
    }

    #[must_use]
    /// Sets the name announced in beacons and replies.
    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.config.device_name = name.into();
        self
    }

    #[must_use]
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.config.platform = platform.into();
        self
    }

    #[must_use]
    pub fn reuse_port(mut self, reuse: bool) -> Self {
        self.config.reuse_port = reuse;
        self
    }

    pub fn build(self) -> DiscoveryConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4};

    #[test]
    fn builder_overrides_only_what_is_set() {
        let config = DiscoveryConfigBuilder::new()
            .device_name("Studio-PC")
            .beacon_interval(Duration::from_millis(250))
            .build();

        assert_eq!(config.device_name, "Studio-PC");
        assert_eq!(config.beacon_interval, Duration::from_millis(250));
        assert_eq!(
            config.bind_addr,
            SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 23335))
        );
        assert!(config.reuse_port);
    }
}
