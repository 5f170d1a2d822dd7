use std::{fmt, sync::Arc};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use webm_box::writer::{AUDIO_TRACK_NUMBER, VIDEO_TRACK_NUMBER};

use crate::services::session::DashWebmStreaming;

pub const WEBM_EXTENSION: &str = "webm";
pub const MANIFEST_FILENAME: &str = "manifest.mpd";

/// The two elementary streams of a session. Each has its own track number,
/// init segment and numbered media segments.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    pub const ALL: [TrackKind; 2] = [TrackKind::Video, TrackKind::Audio];

    pub fn prefix(self) -> &'static str {
        match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
        }
    }

    pub fn track_number(self) -> u32 {
        match self {
            TrackKind::Video => VIDEO_TRACK_NUMBER,
            TrackKind::Audio => AUDIO_TRACK_NUMBER,
        }
    }

    /// `video_init.webm` / `audio_init.webm`
    pub fn init_segment_name(self) -> String {
        format!("{}_init.{}", self.prefix(), WEBM_EXTENSION)
    }

    /// `video{N}.webm` / `audio{N}.webm`, matching the manifest's `$Number$` template.
    pub fn segment_name(self, index: u64) -> String {
        format!("{}{}.{}", self.prefix(), index, WEBM_EXTENSION)
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// One encoded access unit as handed over by the capture/encode side.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedSample {
    pub kind: TrackKind,
    pub payload: Bytes,
    pub presentation_time_us: i64,
    pub is_keyframe: bool,
}

impl fmt::Debug for EncodedSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedSample")
            .field("kind", &self.kind)
            .field("len", &self.payload.len())
            .field("presentation_time_us", &self.presentation_time_us)
            .field("is_keyframe", &self.is_keyframe)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<DashWebmStreaming>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_follow_segment_template() {
        assert_eq!(TrackKind::Video.init_segment_name(), "video_init.webm");
        assert_eq!(TrackKind::Audio.init_segment_name(), "audio_init.webm");
        assert_eq!(TrackKind::Video.segment_name(0), "video0.webm");
        assert_eq!(TrackKind::Audio.segment_name(12), "audio12.webm");
        assert_eq!(TrackKind::Audio.track_number(), 2);
    }
}
