use chrono::{DateTime, Utc};
use dash_mpd::{AdaptationSetDef, MpdBuilder};
use tracing::instrument;

use crate::config::SessionConfig;
use crate::error::Result;

/// Builds the manifest of a session from its configuration.
///
/// The manifest never changes during a session: segment numbers are derived by
/// the player from `availabilityStartTime` and the segment duration.
#[derive(Debug, Clone)]
pub struct MpdManager {
    builder: MpdBuilder,
}

impl MpdManager {
    pub fn new(config: &SessionConfig, availability_start: DateTime<Utc>) -> Self {
        let mut builder = MpdBuilder::live()
            .publish_time(Utc::now())
            .availability_start(availability_start)
            .segment_duration_ms(config.interval_ms)
            .add_adaptation_set(AdaptationSetDef::webm_video(
                config.video_codec.dash_codecs(),
                Some(config.video_bitrate as u64),
            ));

        if config.record_audio {
            builder = builder.add_adaptation_set(AdaptationSetDef::webm_audio(Some(
                config.audio_bitrate as u64,
            )));
        } else {
            builder = builder.min_buffer_time_ms(config.interval_ms);
        }

        Self { builder }
    }

    #[instrument(skip_all)]
    pub fn manifest(&self) -> Result<String> {
        Ok(self.builder.build_xml_string()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VideoCodec;

    #[test]
    fn video_only_session() {
        let config = SessionConfig {
            video_codec: VideoCodec::Vp8,
            ..SessionConfig::default()
        };
        let xml = MpdManager::new(&config, Utc::now()).manifest().unwrap();

        assert_eq!(xml.matches("<AdaptationSet ").count(), 1);
        assert!(xml.contains("codecs=\"vp8\""));
        assert!(xml.contains("initialization=\"/video_init.webm\""));
        assert!(xml.contains("minBufferTime=\"PT1S\""));
    }

    #[test]
    fn audio_session_has_two_adaptation_sets() {
        let config = SessionConfig {
            record_audio: true,
            interval_ms: 2_000,
            ..SessionConfig::default()
        };
        let xml = MpdManager::new(&config, Utc::now()).manifest().unwrap();

        assert_eq!(xml.matches("<AdaptationSet ").count(), 2);
        assert!(xml.contains("media=\"/audio$Number$.webm\""));
        assert!(xml.contains("maxSegmentDuration=\"PT2S\""));
        assert!(xml.contains("duration=\"2000\""));
    }
}
