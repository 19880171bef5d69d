mod control;
mod discovery;
mod transport;

pub use control::{ControlClientConfigBuilder, ControlServerConfigBuilder};
pub use discovery::DiscoveryConfigBuilder;
pub use transport::{FrameReceiverConfigBuilder, FrameSenderConfigBuilder};
