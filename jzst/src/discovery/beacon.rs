use bytes::Bytes;

use crate::protocol::{ControlMessage, DecodeError, EncodeError, MessageType};

/// Presence announcement carried by DISCOVER and DISCOVER_REPLY messages.
///
/// Payload is the UTF-8 text `name|platform`; the name ends at the first `|`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
    pub name: String,
    pub platform: String,
}

impl Beacon {
    pub fn new(name: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: platform.into(),
        }
    }

    pub fn encode(&self) -> Bytes {
        Bytes::from(format!("{}|{}", self.name, self.platform))
    }

    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(payload).map_err(|_| DecodeError::InvalidBeacon)?;
        let (name, platform) = text.split_once('|').ok_or(DecodeError::InvalidBeacon)?;
        Ok(Self::new(name, platform))
    }

    /// Wraps the beacon in a control message of the given discovery type.
    pub fn to_message(&self, kind: MessageType) -> Result<ControlMessage, EncodeError> {
        ControlMessage::new(kind, self.encode())
    }
}
