//! Best-effort chunked delivery of large frames over UDP.
//!
//! The sender splits each frame into datagram-sized chunks; the receiver
//! reassembles them in any arrival order and drops frames that stay
//! incomplete for too long. There is no retransmission, ordering or flow
//! control.

mod assembler;
mod receiver;
mod sender;

pub use assembler::{AssembledFrame, FrameAssembler};
pub use receiver::{FrameHandler, FrameReceiver, FrameReceiverConfig};
pub use sender::{FrameSender, FrameSenderConfig};
