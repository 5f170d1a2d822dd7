//! # WebM / EBML Overview
//!
//! WebM is a restricted profile of Matroska, which in turn is built on EBML (Extensible
//! Binary Meta Language). Every piece of a WebM file is an **element**: a tag-length-value
//! record that may itself contain further elements.
//!
//! ## Structure of an EBML Element
//! - **Element ID**: a variable-length identifier (1 to 4 bytes for WebM). The position of the
//!   first set bit in the first byte tells how many bytes the ID uses.
//! - **Data Size**: a VINT (variable-length integer) announcing the length of the payload.
//!   The all-ones pattern is reserved and means "unknown size".
//! - **Data**: raw bytes, an integer, a string, a float, or the concatenation of child elements.
//!
//! ## Layout of a live WebM stream
//! 1. **EBML header** (`0x1A45DFA3`): doc type `webm` and the reader versions.
//! 2. **Segment** (`0x18538067`), declared with unknown size because a live stream never ends:
//!    - **Info**: timestamp scale (1 ms by default) and the muxing/writing application names.
//!    - **Tracks**: one `TrackEntry` per elementary stream (codec ID, codec private data,
//!      video or audio settings).
//!    - **Cluster** (unknown size): a base timestamp followed by `SimpleBlock`s whose
//!      timestamps are signed 16-bit offsets from that base.
//!
//! ## Implementation in This Library
//! - The `vint` module encodes the VINT wire format for sizes and track numbers.
//! - The `elements` module defines the element model and the typed elements used for WebM.
//! - The `writer` module composes init segments and drives the cluster/timestamp policy.
//! - The `reader` module walks produced bytes back into elements for inspection and tests.

pub mod elements;
pub mod error;
pub mod reader;
pub mod vint;
pub mod writer;

pub use error::MuxError;

/// Formats an element ID the way mkvinfo does (`0x1A45DFA3`).
pub fn format_element_id(id: u32) -> String {
    format!("0x{:X}", id)
}

pub fn format_capped_bytes(data: &[u8]) -> String {
    let capped = &data[..data.len().min(8)];
    if data.len() > 8 {
        format!("{:?} ...", capped)
    } else {
        format!("{:?}", capped)
    }
}
