use tracing::trace;

use crate::elements::{
    cluster::ClusterHeader,
    ebml_header::EbmlHeader,
    generic::{EbmlElement, WebmElement},
    info::{Info, DEFAULT_TIMESTAMP_SCALE},
    segment::Segment,
    simple_block::SimpleBlock,
    track_entry::TrackEntry,
};
use crate::error::{MuxError, Result};

pub const VIDEO_TRACK_NUMBER: u32 = 1;
pub const AUDIO_TRACK_NUMBER: u32 = 2;

pub const VP8_CODEC_ID: &str = "V_VP8";
pub const VP9_CODEC_ID: &str = "V_VP9";
pub const OPUS_CODEC_ID: &str = "A_OPUS";

pub const OPUS_SAMPLE_RATE: f32 = 48_000.0;
pub const OPUS_CHANNELS: u8 = 2;

pub const MUXING_APP: &str = "webm_box";
pub const WRITING_APP: &str = "webm-dash-server";

pub fn create_ebml_header(
    version: u64,
    read_version: u64,
    max_id_length: u64,
    max_size_length: u64,
    doc_type: &str,
    doc_type_version: u64,
    doc_type_read_version: u64,
) -> EbmlElement {
    EbmlHeader {
        version,
        read_version,
        max_id_length,
        max_size_length,
        doc_type: doc_type.to_string(),
        doc_type_version,
        doc_type_read_version,
    }
    .to_element()
}

pub fn create_info(timestamp_scale: u64, muxing_app: &str, writing_app: &str) -> EbmlElement {
    Info {
        timestamp_scale,
        muxing_app: muxing_app.to_string(),
        writing_app: writing_app.to_string(),
    }
    .to_element()
}

pub fn create_track_entry(track: &TrackEntry) -> EbmlElement {
    track.to_element()
}

// Info + Tracks + an empty Cluster at timestamp 0, wrapped in an unknown-size Segment.
pub fn create_segment(info: Info, tracks: Vec<TrackEntry>) -> EbmlElement {
    Segment {
        info,
        tracks,
        cluster: ClusterHeader::new(0),
    }
    .to_element()
}

pub fn create_video_segment(
    muxing_app: &str,
    writing_app: &str,
    track_number: u32,
    codec_id: &str,
    pixel_width: u32,
    pixel_height: u32,
) -> EbmlElement {
    let info = Info {
        timestamp_scale: DEFAULT_TIMESTAMP_SCALE,
        muxing_app: muxing_app.to_string(),
        writing_app: writing_app.to_string(),
    };
    let track = TrackEntry::video(track_number, codec_id, pixel_width, pixel_height);
    create_segment(info, vec![track])
}

pub fn create_audio_segment(
    muxing_app: &str,
    writing_app: &str,
    track_number: u32,
    channels: u8,
    sampling_frequency: f32,
) -> EbmlElement {
    let info = Info {
        timestamp_scale: DEFAULT_TIMESTAMP_SCALE,
        muxing_app: muxing_app.to_string(),
        writing_app: writing_app.to_string(),
    };
    let track = TrackEntry::opus(track_number, channels, sampling_frequency);
    create_segment(info, vec![track])
}

/// Serializes a complete init segment: EBML header followed by the live Segment prelude.
pub fn create_init_segment(tracks: &[TrackEntry]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(512);

    // 1) EBML header
    EbmlHeader::default().write_element(&mut buffer);

    // 2) Segment with Info, Tracks and the placeholder Cluster
    create_segment(Info::default(), tracks.to_vec()).write_element(&mut buffer);

    buffer
}

/// Cluster and timestamp state for one track of a live stream.
///
/// SimpleBlock timestamps are signed 16-bit offsets from the enclosing Cluster, so a new
/// Cluster is opened whenever a keyframe arrives or the offset would leave the `i16` range.
/// Players can only start decoding a Cluster at a keyframe, hence the keyframe rule.
///
/// The writer starts with the init segment's placeholder Cluster (timestamp 0) open.
#[derive(Debug, Clone, Default)]
pub struct ClusterWriter {
    cluster_timestamp_ms: i64,
    last_timestamp_ms: Option<i64>,
    clusters_started: u64,
}

impl ClusterWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cluster_timestamp_ms(&self) -> i64 {
        self.cluster_timestamp_ms
    }

    pub fn last_timestamp_ms(&self) -> Option<i64> {
        self.last_timestamp_ms
    }

    pub fn clusters_started(&self) -> u64 {
        self.clusters_started
    }

    /// Encodes one frame, returning either `Cluster ++ SimpleBlock` or just `SimpleBlock`.
    ///
    /// `presentation_time_ms` is relative to the start of the session. Timestamps must not go
    /// backwards within a track; equal timestamps are accepted.
    pub fn append_simple_block(
        &mut self,
        track_number: u32,
        presentation_time_ms: i64,
        payload: &[u8],
        is_keyframe: bool,
    ) -> Result<Vec<u8>> {
        if track_number == 0 {
            return Err(MuxError::InvalidTrackNumber(track_number));
        }
        if presentation_time_ms < 0 {
            return Err(MuxError::NegativeTimestamp {
                track_number,
                timestamp_ms: presentation_time_ms,
            });
        }
        if let Some(previous_ms) = self.last_timestamp_ms {
            if presentation_time_ms < previous_ms {
                return Err(MuxError::TimestampRegression {
                    track_number,
                    previous_ms,
                    current_ms: presentation_time_ms,
                });
            }
        }

        let mut buffer = Vec::with_capacity(payload.len() + 32);
        let offset = i16::try_from(presentation_time_ms - self.cluster_timestamp_ms);

        let relative_timestamp = match offset {
            Ok(relative) if !is_keyframe => relative,
            _ => {
                trace!(
                    track_number,
                    presentation_time_ms,
                    is_keyframe,
                    "Starting new cluster"
                );
                self.cluster_timestamp_ms = presentation_time_ms;
                self.clusters_started += 1;
                ClusterHeader::new(presentation_time_ms as u64).write_element(&mut buffer);
                0
            }
        };

        SimpleBlock {
            track_number,
            relative_timestamp,
            keyframe: is_keyframe,
            data: payload.to_vec(),
        }
        .write_element(&mut buffer);

        self.last_timestamp_ms = Some(presentation_time_ms);
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::tags::MatroskaTag;
    use crate::reader::{parse_elements, parse_simple_block};

    // (cluster timestamp, relative timestamp, keyframe, payload) for every block in `bytes`.
    fn blocks_with_clusters(bytes: &[u8]) -> Vec<(Option<u64>, i16, bool, Vec<u8>)> {
        let mut cluster = None;
        let mut blocks = Vec::new();
        for element in parse_elements(bytes).unwrap() {
            match element.tag {
                Some(MatroskaTag::Timestamp) => {
                    cluster = Some(crate::reader::read_uint(&element.data));
                }
                Some(MatroskaTag::SimpleBlock) => {
                    let block = parse_simple_block(&element.data).unwrap();
                    blocks.push((cluster, block.relative_timestamp, block.keyframe, block.data));
                }
                _ => {}
            }
        }
        blocks
    }

    #[test]
    fn keyframe_then_deltas_share_one_cluster() {
        let mut writer = ClusterWriter::new();
        let mut stream = Vec::new();
        for (i, timestamp) in [0i64, 200, 400, 600, 800].into_iter().enumerate() {
            let bytes = writer
                .append_simple_block(VIDEO_TRACK_NUMBER, timestamp, &[i as u8; 4], i == 0)
                .unwrap();
            stream.extend_from_slice(&bytes);
        }

        let blocks = blocks_with_clusters(&stream);
        assert_eq!(writer.clusters_started(), 1);
        assert_eq!(blocks.len(), 5);
        for (i, (cluster, relative, keyframe, data)) in blocks.into_iter().enumerate() {
            assert_eq!(cluster, Some(0));
            assert_eq!(relative, (i * 200) as i16);
            assert_eq!(keyframe, i == 0);
            assert_eq!(data, vec![i as u8; 4]);
        }
    }

    #[test]
    fn every_keyframe_opens_a_cluster() {
        let mut writer = ClusterWriter::new();
        let mut stream = Vec::new();
        for frame in 0..90i64 {
            let keyframe = frame % 30 == 0;
            let bytes = writer
                .append_simple_block(VIDEO_TRACK_NUMBER, frame * 33, b"frame", keyframe)
                .unwrap();
            assert_eq!(bytes.starts_with(&MatroskaTag::Cluster.id_bytes()), keyframe);
            stream.extend_from_slice(&bytes);
        }

        let mut previous_cluster = None;
        for (cluster, relative, keyframe, _) in blocks_with_clusters(&stream) {
            if cluster != previous_cluster {
                assert!(keyframe, "cluster {:?} starts with a delta frame", cluster);
                assert_eq!(relative, 0);
                previous_cluster = cluster;
            }
        }
        assert_eq!(writer.clusters_started(), 3);
    }

    #[test]
    fn sixteen_bit_overflow_forces_new_cluster() {
        let mut writer = ClusterWriter::new();
        writer.append_simple_block(1, 1_000, b"k", true).unwrap();

        let last_fitting = writer.append_simple_block(1, 1_000 + 32_767, b"d", false).unwrap();
        assert_eq!(last_fitting[0], 0xA3);
        assert_eq!(writer.cluster_timestamp_ms(), 1_000);

        let overflowing = writer.append_simple_block(1, 1_000 + 32_768, b"d", false).unwrap();
        assert!(overflowing.starts_with(&MatroskaTag::Cluster.id_bytes()));
        assert_eq!(writer.cluster_timestamp_ms(), 33_768);

        let blocks = blocks_with_clusters(&overflowing);
        assert_eq!(blocks, vec![(Some(33_768), 0, false, b"d".to_vec())]);
    }

    #[test]
    fn first_delta_uses_placeholder_cluster() {
        let mut writer = ClusterWriter::new();
        let bytes = writer.append_simple_block(2, 20, b"a", false).unwrap();
        assert_eq!(bytes, vec![0xA3, 0x85, 0x82, 0x00, 0x14, 0x00, b'a']);
    }

    #[test]
    fn regression_is_rejected() {
        let mut writer = ClusterWriter::new();
        writer.append_simple_block(1, 500, b"k", true).unwrap();
        writer.append_simple_block(1, 500, b"d", false).unwrap();

        let error = writer.append_simple_block(1, 499, b"d", false).unwrap_err();
        assert_eq!(
            error,
            MuxError::TimestampRegression {
                track_number: 1,
                previous_ms: 500,
                current_ms: 499
            }
        );
        // State is untouched by the rejected block
        assert_eq!(writer.last_timestamp_ms(), Some(500));
    }

    #[test]
    fn negative_timestamp_and_track_zero_are_rejected() {
        let mut writer = ClusterWriter::new();
        assert!(matches!(
            writer.append_simple_block(1, -1, b"k", true),
            Err(MuxError::NegativeTimestamp { .. })
        ));
        assert_eq!(
            writer.append_simple_block(0, 0, b"k", true),
            Err(MuxError::InvalidTrackNumber(0))
        );
    }

    #[test]
    fn video_init_segment_layout() {
        let init = create_init_segment(&[TrackEntry::video(
            VIDEO_TRACK_NUMBER,
            VP9_CODEC_ID,
            1280,
            720,
        )]);
        let tags: Vec<_> = parse_elements(&init)
            .unwrap()
            .into_iter()
            .filter_map(|e| e.tag)
            .collect();

        assert_eq!(tags.first(), Some(&MatroskaTag::Ebml));
        let segment_at = tags.iter().position(|t| *t == MatroskaTag::Segment).unwrap();
        assert_eq!(
            &tags[segment_at..segment_at + 3],
            &[MatroskaTag::Segment, MatroskaTag::Info, MatroskaTag::TimestampScale]
        );
        assert!(tags.contains(&MatroskaTag::PixelWidth));
        assert!(!tags.contains(&MatroskaTag::CodecPrivate));
        assert_eq!(&tags[tags.len() - 2..], &[MatroskaTag::Cluster, MatroskaTag::Timestamp]);
    }

    #[test]
    fn segment_is_unknown_size() {
        let segment = create_audio_segment(
            MUXING_APP,
            WRITING_APP,
            AUDIO_TRACK_NUMBER,
            OPUS_CHANNELS,
            OPUS_SAMPLE_RATE,
        );
        assert!(segment.has_unknown_size());
        let bytes = segment.to_bytes();
        assert_eq!(&bytes[..4], &MatroskaTag::Segment.id_bytes()[..]);
        assert_eq!(&bytes[4..12], &crate::vint::UNKNOWN_SIZE);
    }

    #[test]
    fn header_builder_matches_defaults() {
        let built = create_ebml_header(1, 1, 4, 8, "webm", 2, 2);
        assert_eq!(built, EbmlHeader::default().to_element());
        let info = create_info(DEFAULT_TIMESTAMP_SCALE, MUXING_APP, WRITING_APP);
        assert_eq!(info, Info::default().to_element());
    }
}
