use std::fmt;

use bytes::Bytes;

use super::error::DecodeError;

/// Streaming parameters requested by the receiving side.
///
/// Wire form is the delimited text `"width|height|maxBitrateMbps|fps|codec"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub width: u32,
    pub height: u32,
    pub max_bitrate_mbps: u32,
    pub fps: u32,
    pub codec: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            max_bitrate_mbps: 100_000,
            fps: 60,
            codec: "h264".to_string(),
        }
    }
}

impl StreamConfig {
    pub fn encode(&self) -> Bytes {
        Bytes::from(self.to_string())
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(data)
            .map_err(|e| DecodeError::InvalidStreamConfig(e.to_string()))?;
        let parts: Vec<&str> = text.split('|').collect();
        let [width, height, bitrate, fps, codec] = parts.as_slice() else {
            return Err(DecodeError::InvalidStreamConfig(format!(
                "expected 5 fields, got {}",
                parts.len()
            )));
        };
        Ok(Self {
            width: parse_field(width)?,
            height: parse_field(height)?,
            max_bitrate_mbps: parse_field(bitrate)?,
            fps: parse_field(fps)?,
            codec: codec.to_string(),
        })
    }
}

fn parse_field(field: &str) -> Result<u32, DecodeError> {
    field
        .parse::<u32>()
        .map_err(|e| DecodeError::InvalidStreamConfig(format!("{field:?}: {e}")))
}

impl fmt::Display for StreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}",
            self.width, self.height, self.max_bitrate_mbps, self.fps, self.codec
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_as_delimited_text() {
        assert_eq!(
            StreamConfig::default().encode().as_ref(),
            b"1920|1080|100000|60|h264"
        );
    }

    #[test]
    fn decodes_wire_form() {
        let config = StreamConfig::decode(b"1280|720|20|30|vp9").unwrap();
        assert_eq!(
            config,
            StreamConfig {
                width: 1280,
                height: 720,
                max_bitrate_mbps: 20,
                fps: 30,
                codec: "vp9".to_string(),
            }
        );
    }

    #[test]
    fn rejects_malformed_text() {
        for bad in [
            &b"1920|1080|100000|60"[..],
            b"1920|1080|100000|60|h264|extra",
            b"wide|1080|100000|60|h264",
            b"-1|1080|100000|60|h264",
            &[0xFF, 0xFE],
        ] {
            assert!(matches!(
                StreamConfig::decode(bad),
                Err(DecodeError::InvalidStreamConfig(_))
            ));
        }
    }
}
