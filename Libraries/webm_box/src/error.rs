use thiserror::Error;

/// Result type for muxing operations.
pub type Result<T> = std::result::Result<T, MuxError>;

/// Errors raised while building or inspecting WebM bytes.
///
/// Every variant that can come out of the writer indicates input the muxer refuses to encode;
/// callers treat them as fatal for the stream, since a malformed cluster corrupts everything
/// that follows it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MuxError {
    /// A presentation time went backwards within one track.
    #[error("timestamp regression on track {track_number}: {current_ms} ms after {previous_ms} ms")]
    TimestampRegression {
        track_number: u32,
        previous_ms: i64,
        current_ms: i64,
    },

    /// A presentation time before the start of the session.
    #[error("negative timestamp on track {track_number}: {timestamp_ms} ms")]
    NegativeTimestamp { track_number: u32, timestamp_ms: i64 },

    /// The value cannot be represented by an 8-byte VINT.
    #[error("value {0} does not fit in an EBML variable-length integer")]
    SizeTooLarge(u64),

    /// Track numbers start at 1 in Matroska.
    #[error("invalid track number {0}")]
    InvalidTrackNumber(u32),

    /// The inspection reader ran out of bytes or found a malformed field.
    #[error("malformed element at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },
}

impl MuxError {
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            offset,
            reason: reason.into(),
        }
    }
}
