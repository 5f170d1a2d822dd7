use prometheus::{IntGauge, Registry};

use crate::error::MetricsError;
use crate::registry::opts_with_labels;

// Gauges describing the segment rotation pipeline.
//
// Fields:
// - `segments_published_*`: media segments published per track since the session started.
// - `segment_publish_time_ms`: wall-clock time of the last rotation (both tracks).
// - `segment_bytes_*`: size of the last published media segment per track.
#[derive(Debug, Clone)]
pub struct PipelineGauges {
    pub segments_published_video: IntGauge,
    pub segments_published_audio: IntGauge,
    pub segment_publish_time_ms: IntGauge,
    pub segment_bytes_video: IntGauge,
    pub segment_bytes_audio: IntGauge,
}

impl PipelineGauges {
    pub(crate) fn register(registry: &Registry, labels: &[(String, String)]) -> Result<Self, MetricsError> {
        let gauge = |name: &str, help: &str| -> Result<IntGauge, MetricsError> {
            let gauge = IntGauge::with_opts(opts_with_labels(name, help, labels))?;
            registry.register(Box::new(gauge.clone()))?;
            Ok(gauge)
        };

        Ok(Self {
            segments_published_video: gauge("segments_published_video", "Video media segments published")?,
            segments_published_audio: gauge("segments_published_audio", "Audio media segments published")?,
            segment_publish_time_ms: gauge("segment_publish_time_ms", "Duration of the last segment rotation in milliseconds")?,
            segment_bytes_video: gauge("segment_bytes_video", "Size of the last video media segment in bytes")?,
            segment_bytes_audio: gauge("segment_bytes_audio", "Size of the last audio media segment in bytes")?,
        })
    }

    pub fn record_video_segment(&self, bytes: u64) {
        self.segments_published_video.inc();
        self.segment_bytes_video.set(bytes as i64);
    }

    pub fn record_audio_segment(&self, bytes: u64) {
        self.segments_published_audio.inc();
        self.segment_bytes_audio.set(bytes as i64);
    }

    pub fn record_rotation(&self, elapsed_ms: u64) {
        self.segment_publish_time_ms.set(elapsed_ms as i64);
    }
}

#[cfg(test)]
mod tests {
    use crate::MetricsBuilder;

    #[test]
    fn records_segments_per_track() {
        let metrics = MetricsBuilder::new().build().unwrap();
        let pipeline = metrics.pipeline();

        pipeline.record_video_segment(4_096);
        pipeline.record_video_segment(2_048);
        pipeline.record_audio_segment(512);
        pipeline.record_rotation(37);

        assert_eq!(pipeline.segments_published_video.get(), 2);
        assert_eq!(pipeline.segment_bytes_video.get(), 2_048);
        assert_eq!(pipeline.segments_published_audio.get(), 1);
        assert_eq!(pipeline.segment_bytes_audio.get(), 512);
        assert_eq!(pipeline.segment_publish_time_ms.get(), 37);
    }
}
