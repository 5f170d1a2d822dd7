use crate::elements::{simple_block::SIMPLE_BLOCK_FLAG_KEYFRAME, simple_block::SimpleBlock, tags::MatroskaTag};
use crate::error::{MuxError, Result};
use crate::vint::decode_vint;

// One element found while walking a WebM byte stream.
//
// Master elements are entered rather than skipped, so the walk yields them in document
// order followed by their children. Their `data` is left empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedElement {
    pub offset: usize,
    pub id: u32,
    pub tag: Option<MatroskaTag>,
    pub size: Option<u64>,
    pub data: Vec<u8>,
}

impl ParsedElement {
    pub fn is_master(&self) -> bool {
        self.tag.is_some_and(MatroskaTag::is_master)
    }
}

/// Reads an element ID at the start of `data`, keeping its length marker bits.
pub fn read_element_id(data: &[u8]) -> Option<(u32, usize)> {
    let first = *data.first()?;
    let length = first.leading_zeros() as usize + 1;
    if length > 4 || data.len() < length {
        return None;
    }

    let id = data[..length]
        .iter()
        .fold(0u32, |id, byte| (id << 8) | *byte as u32);
    Some((id, length))
}

/// Walks `data` from the start and returns every element in document order.
pub fn parse_elements(data: &[u8]) -> Result<Vec<ParsedElement>> {
    let mut elements = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let (element, consumed) = read_element(data, offset)?;
        offset += consumed;
        elements.push(element);
    }

    Ok(elements)
}

// Returns the element at `offset` and how far to advance: past the header for masters,
// past the whole element otherwise.
fn read_element(data: &[u8], offset: usize) -> Result<(ParsedElement, usize)> {
    let remaining = &data[offset..];

    let (id, id_length) = read_element_id(remaining)
        .ok_or_else(|| MuxError::malformed(offset, "invalid element ID"))?;
    let (size, size_length) = decode_vint(&remaining[id_length..])
        .ok_or_else(|| MuxError::malformed(offset + id_length, "invalid data size"))?;

    let tag = MatroskaTag::from_id(id);
    let header_length = id_length + size_length;

    if tag.is_some_and(MatroskaTag::is_master) {
        let element = ParsedElement {
            offset,
            id,
            tag,
            size,
            data: Vec::new(),
        };
        return Ok((element, header_length));
    }

    let size = size.ok_or_else(|| MuxError::malformed(offset, "unknown size on a leaf element"))?;
    let end = header_length
        .checked_add(size as usize)
        .filter(|end| *end <= remaining.len())
        .ok_or_else(|| {
            MuxError::malformed(
                offset,
                format!("element {} of {} bytes runs past the buffer", crate::format_element_id(id), size),
            )
        })?;

    let element = ParsedElement {
        offset,
        id,
        tag,
        size: Some(size),
        data: remaining[header_length..end].to_vec(),
    };
    Ok((element, end))
}

/// Big-endian unsigned integer payload.
pub fn read_uint(data: &[u8]) -> u64 {
    data.iter().fold(0u64, |value, byte| (value << 8) | *byte as u64)
}

pub fn parse_simple_block(data: &[u8]) -> Result<SimpleBlock> {
    let (track_number, track_length) =
        decode_vint(data).ok_or_else(|| MuxError::malformed(0, "invalid track number"))?;
    let track_number = track_number
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| MuxError::malformed(0, "invalid track number"))?;

    let header = data
        .get(track_length..track_length + 3)
        .ok_or_else(|| MuxError::malformed(track_length, "truncated SimpleBlock header"))?;

    Ok(SimpleBlock {
        track_number,
        relative_timestamp: i16::from_be_bytes([header[0], header[1]]),
        keyframe: header[2] & SIMPLE_BLOCK_FLAG_KEYFRAME != 0,
        data: data[track_length + 3..].to_vec(),
    })
}
