use crate::vint::encode_track_vint;

use super::generic::WebmElement;
use super::tags::MatroskaTag;

pub const SIMPLE_BLOCK_FLAG_KEYFRAME: u8 = 0x80;

// The `SimpleBlock` struct carries one encoded access unit (a video frame or an audio packet).
//
// Payload layout:
// - track number as a VINT,
// - timestamp relative to the enclosing Cluster, signed 16-bit big endian,
// - flags (bit 7 = keyframe),
// - the encoded frame.
#[derive(Clone, PartialEq, Eq)]
pub struct SimpleBlock {
    pub track_number: u32,
    pub relative_timestamp: i16,
    pub keyframe: bool,
    pub data: Vec<u8>,
}

impl SimpleBlock {
    pub fn flags(&self) -> u8 {
        if self.keyframe {
            SIMPLE_BLOCK_FLAG_KEYFRAME
        } else {
            0x00
        }
    }
}

impl std::fmt::Debug for SimpleBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleBlock")
            .field("track_number", &self.track_number)
            .field("relative_timestamp", &self.relative_timestamp)
            .field("keyframe", &self.keyframe)
            .field("data", &crate::format_capped_bytes(&self.data))
            .finish()
    }
}

impl WebmElement for SimpleBlock {
    fn tag(&self) -> MatroskaTag {
        MatroskaTag::SimpleBlock
    }

    fn payload(&self) -> Vec<u8> {
        let track = encode_track_vint(self.track_number);
        let mut payload = Vec::with_capacity(track.len() + 3 + self.data.len());
        payload.extend_from_slice(&track);
        payload.extend_from_slice(&self.relative_timestamp.to_be_bytes());
        payload.push(self.flags());
        payload.extend_from_slice(&self.data);
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyframe_block_bytes() {
        let block = SimpleBlock {
            track_number: 1,
            relative_timestamp: 0,
            keyframe: true,
            data: vec![0xDE, 0xAD],
        };
        assert_eq!(
            block.to_element().to_bytes(),
            vec![0xA3, 0x86, 0x81, 0x00, 0x00, 0x80, 0xDE, 0xAD]
        );
    }

    #[test]
    fn negative_relative_timestamp_is_twos_complement() {
        let block = SimpleBlock {
            track_number: 2,
            relative_timestamp: -2,
            keyframe: false,
            data: vec![],
        };
        assert_eq!(block.payload(), vec![0x82, 0xFF, 0xFE, 0x00]);
    }
}
