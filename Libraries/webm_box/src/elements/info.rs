use super::generic::{concat_elements, EbmlElement, WebmElement};
use super::tags::MatroskaTag;

/// Nanoseconds per timestamp tick; one million makes every later timestamp a millisecond.
pub const DEFAULT_TIMESTAMP_SCALE: u64 = 1_000_000;

// The `Info` struct represents the Segment Information element.
//
// Fields:
// - `timestamp_scale`: nanoseconds per tick for Cluster and SimpleBlock timestamps.
// - `muxing_app`: the library that produced the file.
// - `writing_app`: the application that used the library.
#[derive(Debug, Clone, PartialEq)]
pub struct Info {
    pub timestamp_scale: u64,
    pub muxing_app: String,
    pub writing_app: String,
}

impl Default for Info {
    fn default() -> Self {
        Info {
            timestamp_scale: DEFAULT_TIMESTAMP_SCALE,
            muxing_app: crate::writer::MUXING_APP.to_string(),
            writing_app: crate::writer::WRITING_APP.to_string(),
        }
    }
}

impl WebmElement for Info {
    fn tag(&self) -> MatroskaTag {
        MatroskaTag::Info
    }

    fn payload(&self) -> Vec<u8> {
        concat_elements(&[
            EbmlElement::uint(MatroskaTag::TimestampScale, self.timestamp_scale),
            EbmlElement::ascii(MatroskaTag::MuxingApp, &self.muxing_app),
            EbmlElement::ascii(MatroskaTag::WritingApp, &self.writing_app),
        ])
    }
}
