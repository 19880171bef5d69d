pub mod codec;
pub mod constants;
mod error;
pub mod frame;
pub mod message;
pub mod stream_config;

pub use codec::ControlCodec;
pub use error::{DecodeError, EncodeError};
pub use frame::{FramePacket, split_frame};
pub use message::{AuthStatus, ControlMessage, MessageType};
pub use stream_config::StreamConfig;
