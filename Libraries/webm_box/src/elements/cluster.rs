use crate::vint::encode_uint;

use super::generic::{EbmlElement, WebmElement};
use super::tags::MatroskaTag;

// The `ClusterHeader` struct represents the opening of a live Cluster.
// Only the Timestamp child is written here; SimpleBlocks follow it in the byte stream as they
// are produced, which is why the Cluster is declared with unknown size.
//
// Fields:
// - `timestamp_ms`: the base timestamp every SimpleBlock in the Cluster is relative to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterHeader {
    pub timestamp_ms: u64,
}

impl ClusterHeader {
    pub fn new(timestamp_ms: u64) -> Self {
        Self { timestamp_ms }
    }
}

impl WebmElement for ClusterHeader {
    fn tag(&self) -> MatroskaTag {
        MatroskaTag::Cluster
    }

    fn payload(&self) -> Vec<u8> {
        EbmlElement::new(MatroskaTag::Timestamp, encode_uint(self.timestamp_ms)).to_bytes()
    }

    fn is_streaming(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_cluster_bytes() {
        let bytes = ClusterHeader::new(40_000).to_element().to_bytes();
        assert_eq!(
            bytes,
            vec![
                0x1F, 0x43, 0xB6, 0x75, // Cluster
                0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // unknown size
                0xE7, 0x82, 0x9C, 0x40, // Timestamp 40000
            ]
        );
    }
}
