// EBML variable-length integers (VINTs).
//
// The number of leading zero bits in the first byte, plus one, gives the total length of the
// integer: `1xxx_xxxx` is one byte carrying 7 bits, `01xx_xxxx xxxx_xxxx` is two bytes
// carrying 14 bits, and so on up to eight bytes carrying 56 bits. For every length the
// pattern with all value bits set is reserved as "unknown size", so the largest value that
// fits in `n` bytes is `2^(7n) - 2`.

use crate::error::{MuxError, Result};

pub const MAX_VINT_LENGTH: usize = 8;

// Reserved "unknown size" marker for live Segments and Clusters (8-byte all-ones VINT).
pub const UNKNOWN_SIZE: [u8; 8] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// Number of bytes needed to encode `value`, or `None` past the 8-byte limit.
pub fn vint_length(value: u64) -> Option<usize> {
    (1..=MAX_VINT_LENGTH).find(|&length| value < (1u64 << (7 * length)) - 1)
}

/// Encodes `value` as the shortest valid VINT.
pub fn encode_vint(value: u64) -> Result<Vec<u8>> {
    let length = vint_length(value).ok_or(MuxError::SizeTooLarge(value))?;
    let mut bytes = value.to_be_bytes()[MAX_VINT_LENGTH - length..].to_vec();
    bytes[0] |= 0x80 >> (length - 1);
    Ok(bytes)
}

/// Encodes the data-size field for a payload of `size` bytes.
///
/// A zero-length payload still yields a one-byte field (`0x80`).
pub fn encode_size(size: usize) -> Vec<u8> {
    // In-memory payloads never approach 2^56 bytes.
    encode_vint(size as u64).unwrap_or_else(|_| UNKNOWN_SIZE.to_vec())
}

/// Encodes a track number the way SimpleBlock headers carry it (track 1 is `0x81`).
pub fn encode_track_vint(track_number: u32) -> Vec<u8> {
    encode_size(track_number as usize)
}

/// Decodes a VINT at the start of `data`.
///
/// Returns the value (`None` for the reserved unknown-size pattern) and the number of bytes
/// consumed, or `None` when `data` does not start with a complete VINT.
pub fn decode_vint(data: &[u8]) -> Option<(Option<u64>, usize)> {
    let first = *data.first()?;
    if first == 0 {
        return None;
    }

    let length = first.leading_zeros() as usize + 1;
    if data.len() < length {
        return None;
    }

    let mask = (0xFFu16 >> length) as u8;
    let mut value = (first & mask) as u64;
    for byte in &data[1..length] {
        value = (value << 8) | *byte as u64;
    }

    let all_ones = (1u64 << (7 * length)) - 1;
    if value == all_ones {
        Some((None, length))
    } else {
        Some((Some(value), length))
    }
}

/// Minimal big-endian payload for an EBML unsigned integer element (at least one byte).
pub fn encode_uint(value: u64) -> Vec<u8> {
    let skip = ((value.leading_zeros() / 8) as usize).min(7);
    value.to_be_bytes()[skip..].to_vec()
}
