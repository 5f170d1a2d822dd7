use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, instrument, trace, warn};
use webm_box::elements::track_entry::TrackEntry;
use webm_box::writer::{create_init_segment, ClusterWriter, OPUS_CHANNELS, OPUS_SAMPLE_RATE};
use webm_box::MuxError;

use crate::config::SessionConfig;
use crate::error::{Result, StreamError};
use crate::services::content_manager::write_with_retry;
use crate::types::{EncodedSample, TrackKind};

/// Outcome of [`SegmentWriter::append_encoded_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    // Video samples ahead of the first keyframe cannot be decoded on their own.
    DroppedBeforeKeyframe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub kind: TrackKind,
    pub path: PathBuf,
    pub blocks: usize,
    pub bytes: u64,
}

// Muxing state of one track, guarded by that track's lock.
//
// Fields:
// - `cluster_writer`: cluster base and last timestamp of the track.
// - `pending`: encoded Cluster/SimpleBlock chunks not yet written to a media segment.
// - `first_presentation_time_us`: encoder time of the first observed sample, dropped or
//   not; timestamps in the container are relative to it.
// - `last_presentation_time_us`: encoder time of the latest observed sample.
// - `waiting_for_keyframe`: set for video until the first keyframe arrives.
#[derive(Debug)]
struct TrackState {
    track: TrackEntry,
    cluster_writer: ClusterWriter,
    pending: Vec<Bytes>,
    pending_bytes: usize,
    first_presentation_time_us: Option<i64>,
    last_presentation_time_us: Option<i64>,
    waiting_for_keyframe: bool,
    dropped_samples: u64,
}

impl TrackState {
    fn new(kind: TrackKind, track: TrackEntry) -> Self {
        Self {
            track,
            cluster_writer: ClusterWriter::new(),
            pending: Vec::new(),
            pending_bytes: 0,
            first_presentation_time_us: None,
            last_presentation_time_us: None,
            waiting_for_keyframe: kind == TrackKind::Video,
            dropped_samples: 0,
        }
    }
}

/// Accumulates muxed blocks per track between rotations.
///
/// Each track has its own lock, so an audio flush never waits on video and
/// vice versa. Within a track, appends and flushes are serialized: a block is
/// either in the segment being flushed or in the next one.
#[derive(Debug)]
pub struct SegmentWriter {
    video: Mutex<TrackState>,
    audio: Option<Mutex<TrackState>>,
}

impl SegmentWriter {
    pub fn new(video: TrackEntry, audio: Option<TrackEntry>) -> Self {
        Self {
            video: Mutex::new(TrackState::new(TrackKind::Video, video)),
            audio: audio.map(|track| Mutex::new(TrackState::new(TrackKind::Audio, track))),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        let video = TrackEntry::video(
            TrackKind::Video.track_number(),
            config.video_codec.codec_id(),
            config.video_width,
            config.video_height,
        );
        let audio = config.record_audio.then(|| {
            TrackEntry::opus(TrackKind::Audio.track_number(), OPUS_CHANNELS, OPUS_SAMPLE_RATE)
        });
        Self::new(video, audio)
    }

    pub fn has_track(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Video => true,
            TrackKind::Audio => self.audio.is_some(),
        }
    }

    fn state(&self, kind: TrackKind) -> Result<&Mutex<TrackState>> {
        match kind {
            TrackKind::Video => Ok(&self.video),
            TrackKind::Audio => self.audio.as_ref().ok_or(StreamError::TrackDisabled(kind)),
        }
    }

    /// EBML header and Segment prelude for `kind`, written once per session.
    pub async fn init_segment(&self, kind: TrackKind) -> Result<Vec<u8>> {
        let state = self.state(kind)?.lock().await;
        Ok(create_init_segment(std::slice::from_ref(&state.track)))
    }

    /// Mux one encoded sample and queue the bytes for the next media segment.
    ///
    /// Audio packets are all independently decodable and are muxed as keyframes.
    pub async fn append_encoded_data(&self, sample: &EncodedSample) -> Result<AppendOutcome> {
        let kind = sample.kind;
        let mut state = self.state(kind)?.lock().await;

        let origin_us = *state
            .first_presentation_time_us
            .get_or_insert(sample.presentation_time_us);
        // Checked in microseconds: a step back smaller than 1 ms is still a regression
        if let Some(previous_us) = state.last_presentation_time_us {
            if sample.presentation_time_us < previous_us {
                return Err(MuxError::TimestampRegression {
                    track_number: kind.track_number(),
                    previous_ms: rebase_ms(previous_us, origin_us),
                    current_ms: rebase_ms(sample.presentation_time_us, origin_us),
                }
                .into());
            }
        }
        state.last_presentation_time_us = Some(sample.presentation_time_us);

        if state.waiting_for_keyframe && !sample.is_keyframe {
            state.dropped_samples += 1;
            if state.dropped_samples == 1 {
                warn!("Dropping {} samples until the first keyframe", kind);
            }
            return Ok(AppendOutcome::DroppedBeforeKeyframe);
        }

        let presentation_time_ms = rebase_ms(sample.presentation_time_us, origin_us);
        let is_keyframe = kind == TrackKind::Audio || sample.is_keyframe;

        let chunk = state.cluster_writer.append_simple_block(
            kind.track_number(),
            presentation_time_ms,
            &sample.payload,
            is_keyframe,
        )?;

        if state.waiting_for_keyframe {
            debug!(
                "First {} keyframe after {} dropped samples",
                kind, state.dropped_samples
            );
            state.waiting_for_keyframe = false;
        }

        trace!(%kind, presentation_time_ms, len = chunk.len(), "Queued block");
        state.pending_bytes += chunk.len();
        state.pending.push(Bytes::from(chunk));
        Ok(AppendOutcome::Appended)
    }

    /// Write every pending chunk of `kind` to `path`, in arrival order, and clear them.
    ///
    /// With nothing pending an empty file is written. On failure the chunks stay
    /// pending.
    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn flush_to_file(&self, kind: TrackKind, path: &Path) -> Result<FlushReport> {
        let mut state = self.state(kind)?.lock().await;

        let mut buffer = Vec::with_capacity(state.pending_bytes);
        for chunk in &state.pending {
            buffer.extend_from_slice(chunk);
        }
        write_with_retry(path, &buffer).await?;

        let report = FlushReport {
            kind,
            path: path.to_path_buf(),
            blocks: state.pending.len(),
            bytes: buffer.len() as u64,
        };
        state.pending.clear();
        state.pending_bytes = 0;

        debug!("Flushed {} chunks ({} bytes)", report.blocks, report.bytes);
        Ok(report)
    }

    pub async fn pending_chunks(&self, kind: TrackKind) -> Result<usize> {
        Ok(self.state(kind)?.lock().await.pending.len())
    }
}

fn rebase_ms(presentation_time_us: i64, origin_us: i64) -> i64 {
    (presentation_time_us - origin_us).div_euclid(1000)
}
