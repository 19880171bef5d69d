use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{JzstError, Result};
use crate::protocol::constants::{FRAME_SOCKET_BUFFER_SIZE, MAX_DATAGRAM_SIZE};
use crate::transport::{FrameReceiverConfig, FrameSenderConfig};

/// Configuration builder for [`crate::transport::FrameSender`].
///
/// The target address has no default; [`build`](Self::build) fails without it.
#[derive(Debug, Clone)]
pub struct FrameSenderConfigBuilder {
    target: Option<SocketAddr>,
    bind_addr: Option<SocketAddr>,
    max_datagram_size: usize,
    send_buffer_size: usize,
}

impl Default for FrameSenderConfigBuilder {
    fn default() -> Self {
        Self {
            target: None,
            bind_addr: None,
            max_datagram_size: MAX_DATAGRAM_SIZE,
            send_buffer_size: FRAME_SOCKET_BUFFER_SIZE,
        }
    }
}

impl FrameSenderConfigBuilder {
    /// Creates a new [`FrameSenderConfigBuilder`] with default values.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    /// Sets the address every chunk is sent to.
    pub fn target(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.target = Some(addr.into());
        self
    }

    #[must_use]
    pub fn bind_addr(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.bind_addr = Some(addr.into());
        self
    }

    #[must_use]
    /// Sets the largest datagram emitted, header included.
    pub fn max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size;
        self
    }

    #[must_use]
    pub fn send_buffer_size(mut self, size: usize) -> Self {
        self.send_buffer_size = size;
        self
    }

    pub fn build(self) -> Result<FrameSenderConfig> {
        let target = self
            .target
            .ok_or_else(|| JzstError::MissingConfigValue("target".to_string()))?;
        Ok(FrameSenderConfig {
            target,
            bind_addr: self.bind_addr,
            max_datagram_size: self.max_datagram_size,
            send_buffer_size: self.send_buffer_size,
        })
    }
}

/// Configuration builder for [`crate::transport::FrameReceiver`].
#[derive(Debug, Clone)]
pub struct FrameReceiverConfigBuilder {
    config: FrameReceiverConfig,
}

impl Default for FrameReceiverConfigBuilder {
    fn default() -> Self {
        Self {
            config: FrameReceiverConfig::default(),
        }
    }
}

impl From<FrameReceiverConfigBuilder> for FrameReceiverConfig {
    fn from(builder: FrameReceiverConfigBuilder) -> Self {
        builder.build()
    }
}

impl FrameReceiverConfigBuilder {
    /// Creates a new [`FrameReceiverConfigBuilder`] with default values.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bind_addr(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    #[must_use]
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = size;
        self
    }

    #[must_use]
    /// Sets the age after which an incomplete frame is dropped.
    pub fn frame_timeout(mut self, timeout: Duration) -> Self {
        self.config.frame_timeout = timeout;
        self
    }

    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    #[must_use]
    /// Sets how many frames may be reassembled at once.
    pub fn max_pending_frames(mut self, frames: usize) -> Self {
        self.config.max_pending_frames = frames;
        self
    }

    #[must_use]
    pub fn max_datagram_size(mut self, size: usize) -> Self {
        self.config.max_datagram_size = size;
        self
    }

    pub fn build(self) -> FrameReceiverConfig {
        self.config
    }
}
