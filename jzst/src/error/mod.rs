use std::io;
use thiserror::Error;

use crate::protocol::{AuthStatus, DecodeError, EncodeError, MessageType};

/// Errors raised inside the jzst loops and handshakes.
///
/// Public protocol operations never surface these directly; they are logged
/// and collapsed into boolean results or protocol response codes.
#[derive(Debug, Error)]
pub enum JzstError {
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Malformed wire data
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Value cannot be represented on the wire
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The peer closed the control connection
    #[error("connection closed")]
    ConnectionClosed,

    /// A well-formed message arrived where the protocol expects another type
    #[error("unexpected message: {0:?}")]
    UnexpectedMessage(MessageType),

    /// The accepting side refused our credentials
    #[error("authentication rejected: {0:?}")]
    AuthRejected(AuthStatus),

    /// Timeout error
    #[error("operation timed out")]
    Timeout,

    /// A builder was finished without a required value
    #[error("missing config value: {0}")]
    MissingConfigValue(String),
}

impl From<tokio::time::error::Elapsed> for JzstError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        JzstError::Timeout
    }
}

pub type Result<T> = std::result::Result<T, JzstError>;
