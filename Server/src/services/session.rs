use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use metrics::PipelineGauges;
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::SessionConfig;
use crate::error::{Result, StreamError};
use crate::ingress::{run_feed, EncoderReceiver};
use crate::services::content_manager::ContentManager;
use crate::services::mpd_manager::MpdManager;
use crate::services::segment_writer::{FlushReport, SegmentWriter};
use crate::types::{TrackKind, MANIFEST_FILENAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Initializing,
    Encoding,
    Stopped,
}

/// Encoder output of one session: video always, audio when recorded.
#[derive(Debug)]
pub struct EncoderFeeds {
    pub video: EncoderReceiver,
    pub audio: Option<EncoderReceiver>,
}

// The `StreamingStrategy` trait is the lifecycle of one way of packaging and publishing a stream.
//
// Required Methods:
// - `start`: prepare the output (init segments, manifest) before any media arrives.
// - `encode_and_publish`: consume encoder output and publish it until stopped or failed.
// - `stop`: end the session; already-published output stays in place.
// - `state`: where the session is in its lifecycle.
#[async_trait]
pub trait StreamingStrategy: Send + Sync {
    async fn start(&self) -> Result<()>;

    async fn encode_and_publish(&self, feeds: EncoderFeeds) -> Result<()>;

    async fn stop(&self);

    fn state(&self) -> SessionState;
}

/// Delay before the next rotation so that rotations stay on the `interval` grid
/// regardless of how long publishing took.
pub fn next_tick_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Run `tick` every `interval` until `cancel` fires, subtracting the time each
/// tick took from the following wait. A tick that has started always runs to
/// completion; a failing tick ends the loop. Returns the number of ticks run.
pub async fn run_rotation_timer<F, Fut>(
    interval: Duration,
    cancel: &CancellationToken,
    mut tick: F,
) -> Result<u64>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut delay = interval;
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        let started = Instant::now();
        tick().await?;
        let elapsed = started.elapsed();

        if elapsed > interval {
            warn!("Rotation took {:?}, longer than the {:?} interval", elapsed, interval);
        }
        delay = next_tick_delay(interval, elapsed);
        ticks += 1;
    }

    Ok(ticks)
}

/// Live WebM over MPEG-DASH: numbered media segments per track, rotated every
/// `interval_ms`, described by a static dynamic-type manifest.
#[derive(Debug)]
pub struct DashWebmStreaming {
    config: SessionConfig,
    content: Arc<ContentManager>,
    writer: Arc<SegmentWriter>,
    state: watch::Sender<SessionState>,
    cancel: CancellationToken,
    metrics: Option<PipelineGauges>,
}

impl DashWebmStreaming {
    pub fn new(config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            content: Arc::new(ContentManager::new(&config.output_dir)),
            writer: Arc::new(SegmentWriter::from_config(&config)),
            config,
            state,
            cancel: CancellationToken::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: PipelineGauges) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn content(&self) -> &ContentManager {
        &self.content
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            info!("Session {:?} -> {:?}", previous, state);
        }
    }

    fn expect_state(&self, expected: SessionState) -> Result<()> {
        let current = *self.state.borrow();
        if current != expected {
            return Err(StreamError::InvalidState { current, expected });
        }
        Ok(())
    }

    fn tracks(&self) -> Vec<TrackKind> {
        TrackKind::ALL
            .into_iter()
            .filter(|kind| self.writer.has_track(*kind))
            .collect()
    }

    async fn initialize(&self) -> Result<()> {
        let removed = self.content.reset_all().await?;
        debug!("Removed {} files of a previous session", removed);

        for kind in self.tracks() {
            let init = self.writer.init_segment(kind).await?;
            self.content
                .write_static_file(&kind.init_segment_name(), &init)
                .await?;
        }

        let manifest = MpdManager::new(&self.config, Utc::now()).manifest()?;
        self.content
            .write_static_file(MANIFEST_FILENAME, manifest.as_bytes())
            .await?;
        Ok(())
    }

    /// Flush one track into its next numbered segment and publish it.
    async fn publish_segment(&self, kind: TrackKind) -> Result<FlushReport> {
        let slot = self.content.allocate_next_segment(kind);
        let report = self.writer.flush_to_file(kind, &slot.temp_path).await?;
        self.content.publish(&slot).await?;
        self.content.retain(&slot).await;

        if let Some(metrics) = &self.metrics {
            match kind {
                TrackKind::Video => metrics.record_video_segment(report.bytes),
                TrackKind::Audio => metrics.record_audio_segment(report.bytes),
            }
        }
        debug!("Published {} ({} blocks)", slot.final_path.display(), report.blocks);
        Ok(report)
    }

    /// One rotation: audio and video are flushed and published concurrently.
    async fn rotate(&self) -> Result<()> {
        let started = Instant::now();

        if self.writer.has_track(TrackKind::Audio) {
            let (video, audio) = tokio::join!(
                self.publish_segment(TrackKind::Video),
                self.publish_segment(TrackKind::Audio)
            );
            video?;
            audio?;
        } else {
            self.publish_segment(TrackKind::Video).await?;
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_rotation(started.elapsed().as_millis() as u64);
        }
        Ok(())
    }

    fn spawn_feed(&self, receiver: EncoderReceiver) -> JoinHandle<Result<u64>> {
        tokio::spawn(run_feed(receiver, self.writer.clone(), self.cancel.clone()))
    }
}

// Flattens a feed task result; a feed that returned normally saw the cancellation.
fn feed_result(joined: std::result::Result<Result<u64>, tokio::task::JoinError>) -> Result<()> {
    joined??;
    Ok(())
}

async fn join_feed(feed: Option<&mut JoinHandle<Result<u64>>>) -> Result<()> {
    match feed {
        Some(handle) => feed_result(handle.await),
        None => std::future::pending().await,
    }
}

#[async_trait]
impl StreamingStrategy for DashWebmStreaming {
    #[instrument(skip_all)]
    async fn start(&self) -> Result<()> {
        self.expect_state(SessionState::Idle)?;
        self.set_state(SessionState::Initializing);

        if let Err(e) = self.initialize().await {
            error!("Session initialization failed: {}", e);
            self.set_state(SessionState::Stopped);
            return Err(e);
        }

        info!(
            "Session ready in {:?} ({} tracks)",
            self.content.output_dir(),
            self.tracks().len()
        );
        Ok(())
    }

    #[instrument(skip_all)]
    async fn encode_and_publish(&self, feeds: EncoderFeeds) -> Result<()> {
        self.expect_state(SessionState::Initializing)?;
        if feeds.audio.is_some() != self.writer.has_track(TrackKind::Audio) {
            self.set_state(SessionState::Stopped);
            return Err(StreamError::Config(
                "audio feed does not match the session configuration".into(),
            ));
        }
        self.set_state(SessionState::Encoding);

        let mut video_feed = self.spawn_feed(feeds.video);
        let mut audio_feed = feeds.audio.map(|receiver| self.spawn_feed(receiver));

        let rotation = run_rotation_timer(self.config.interval(), &self.cancel, move || self.rotate());
        tokio::pin!(rotation);

        // The first of: rotation loop ends, a feed ends, or a feed fails.
        let (outcome, rotation_done) = tokio::select! {
            result = &mut rotation => (result.map(|_| ()), true),
            result = &mut video_feed => (feed_result(result), false),
            result = join_feed(audio_feed.as_mut()) => (result, false),
        };

        self.cancel.cancel();
        // Let an in-flight rotation finish so no truncated segment gets published
        let outcome = if rotation_done {
            outcome
        } else {
            outcome.and(rotation.await.map(|_| ()))
        };

        video_feed.abort();
        if let Some(handle) = audio_feed {
            handle.abort();
        }

        match &outcome {
            Ok(()) => info!("Session stopped"),
            Err(e) => error!("Session stopped: {}", e),
        }
        self.set_state(SessionState::Stopped);
        outcome
    }

    #[instrument(skip_all)]
    async fn stop(&self) {
        self.cancel.cancel();

        let mut state = self.state.subscribe();
        let current = *state.borrow();
        if current != SessionState::Encoding {
            self.set_state(SessionState::Stopped);
            return;
        }
        // encode_and_publish sets Stopped once its last rotation is done
        if let Err(e) = state.wait_for(|s| *s == SessionState::Stopped).await {
            debug!("Session state channel closed while stopping: {}", e);
        };
    }

    fn state(&self) -> SessionState {
        *self.state.borrow()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;
    use rand::Rng;
    use webm_box::elements::tags::MatroskaTag;
    use webm_box::reader::{parse_elements, parse_simple_block};

    use super::*;
    use crate::ingress::{encoder_channel, EncoderSender};

    #[test]
    fn delay_subtracts_elapsed_time() {
        let interval = Duration::from_millis(1000);
        assert_eq!(next_tick_delay(interval, Duration::from_millis(50)), Duration::from_millis(950));
        assert_eq!(next_tick_delay(interval, Duration::ZERO), interval);
        assert_eq!(next_tick_delay(interval, Duration::from_millis(1000)), Duration::ZERO);
        assert_eq!(next_tick_delay(interval, Duration::from_millis(1700)), Duration::ZERO);
    }

    // Ticks whose work takes a random share of the interval must still start on
    // the N * interval grid.
    #[tokio::test(start_paused = true)]
    async fn rotation_timer_does_not_drift() {
        const TICKS: u64 = 100;
        let interval = Duration::from_millis(1000);
        let cancel = CancellationToken::new();
        let starts = Mutex::new(Vec::new());
        let origin = Instant::now();

        let ticks = run_rotation_timer(interval, &cancel, || {
            let work = Duration::from_millis(rand::thread_rng().gen_range(0..900));
            let mut starts = starts.lock().unwrap();
            starts.push(Instant::now() - origin);
            if starts.len() as u64 == TICKS {
                cancel.cancel();
            }
            async move {
                tokio::time::sleep(work).await;
                Ok(())
            }
        })
        .await
        .unwrap();

        assert_eq!(ticks, TICKS);
        let starts = starts.into_inner().unwrap();
        for (n, start) in starts.iter().enumerate() {
            let ideal = interval * (n as u32 + 1);
            let drift = start.abs_diff(ideal);
            assert!(drift < interval, "tick {} started at {:?}, ideal {:?}", n, start, ideal);
        }
        let last = *starts.last().unwrap();
        assert!(last.abs_diff(interval * TICKS as u32) <= Duration::from_millis(TICKS));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tick_runs_next_immediately() {
        let interval = Duration::from_millis(100);
        let cancel = CancellationToken::new();
        let starts = Mutex::new(Vec::new());
        let origin = Instant::now();

        run_rotation_timer(interval, &cancel, || {
            let mut starts = starts.lock().unwrap();
            starts.push(Instant::now() - origin);
            if starts.len() == 2 {
                cancel.cancel();
            }
            async {
                tokio::time::sleep(Duration::from_millis(250)).await;
                Ok(())
            }
        })
        .await
        .unwrap();

        let starts = starts.into_inner().unwrap();
        assert_eq!(starts, vec![Duration::from_millis(100), Duration::from_millis(350)]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_tick_ends_the_timer() {
        let cancel = CancellationToken::new();
        let result = run_rotation_timer(Duration::from_millis(10), &cancel, || async {
            Err(StreamError::Config("boom".into()))
        })
        .await;
        assert!(matches!(result, Err(StreamError::Config(_))));
    }

    fn config(dir: &std::path::Path, record_audio: bool) -> SessionConfig {
        SessionConfig {
            interval_ms: 1_000,
            record_audio,
            output_dir: dir.to_path_buf(),
            ..SessionConfig::default()
        }
    }

    async fn wait_for_file(path: &std::path::Path) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !path.exists() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn start_writes_init_segments_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("video99.webm"), b"stale").unwrap();

        let session = DashWebmStreaming::new(config(dir.path(), true));
        assert_eq!(session.state(), SessionState::Idle);
        session.start().await.unwrap();
        assert_eq!(session.state(), SessionState::Initializing);

        assert!(!dir.path().join("video99.webm").exists());
        let manifest = std::fs::read_to_string(dir.path().join(MANIFEST_FILENAME)).unwrap();
        assert!(manifest.contains("audio_init.webm"));

        let video_init = std::fs::read(dir.path().join("video_init.webm")).unwrap();
        assert_eq!(&video_init[..4], &MatroskaTag::Ebml.id_bytes()[..]);
        assert!(dir.path().join("audio_init.webm").exists());

        assert!(matches!(
            session.start().await,
            Err(StreamError::InvalidState { current: SessionState::Initializing, .. })
        ));
    }

    // Five video samples 200 ms apart, the first a keyframe, land in video0.webm as
    // a single Cluster holding five SimpleBlocks in input order.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn five_frames_become_one_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(DashWebmStreaming::new(config(dir.path(), false)));
        session.start().await.unwrap();

        let (video_tx, video_rx) = encoder_channel(TrackKind::Video, 16);
        let running = {
            let session = session.clone();
            tokio::spawn(async move {
                session
                    .encode_and_publish(EncoderFeeds { video: video_rx, audio: None })
                    .await
            })
        };

        for frame in 0..5u8 {
            video_tx
                .send_sample(Bytes::from(vec![frame; 3]), frame as i64 * 200_000, frame == 0)
                .await
                .unwrap();
        }

        let segment = dir.path().join("video0.webm");
        wait_for_file(&segment).await;
        session.stop().await;
        running.await.unwrap().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);

        let elements = parse_elements(&std::fs::read(&segment).unwrap()).unwrap();
        assert!(!elements.iter().any(|e| e.tag == Some(MatroskaTag::Ebml)));
        assert_eq!(elements[0].tag, Some(MatroskaTag::Cluster));
        assert_eq!(
            elements.iter().filter(|e| e.tag == Some(MatroskaTag::Cluster)).count(),
            1
        );

        let blocks: Vec<_> = elements
            .iter()
            .filter(|e| e.tag == Some(MatroskaTag::SimpleBlock))
            .map(|e| parse_simple_block(&e.data).unwrap())
            .collect();
        assert_eq!(blocks.len(), 5);
        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(block.relative_timestamp, i as i16 * 200);
            assert_eq!(block.keyframe, i == 0);
            assert_eq!(block.data, vec![i as u8; 3]);
        }
        assert!(!dir.path().join("audio0.webm").exists());
    }

    async fn send_audio(tx: &EncoderSender, packets: std::ops::Range<i64>) {
        for packet in packets {
            tx.send_sample(Bytes::from_static(b"opus"), packet * 20_000, true)
                .await
                .unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn encoder_failure_stops_session_and_keeps_segments() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(DashWebmStreaming::new(config(dir.path(), true)));
        session.start().await.unwrap();

        let (video_tx, video_rx) = encoder_channel(TrackKind::Video, 16);
        let (audio_tx, audio_rx) = encoder_channel(TrackKind::Audio, 16);
        let running = {
            let session = session.clone();
            tokio::spawn(async move {
                session
                    .encode_and_publish(EncoderFeeds { video: video_rx, audio: Some(audio_rx) })
                    .await
            })
        };

        video_tx.send_sample(Bytes::from_static(b"k"), 0, true).await.unwrap();
        send_audio(&audio_tx, 0..5).await;
        wait_for_file(&dir.path().join("audio0.webm")).await;
        wait_for_file(&dir.path().join("video0.webm")).await;

        audio_tx.fail("capture device lost").await.unwrap();
        let error = running.await.unwrap().unwrap_err();
        assert!(matches!(error, StreamError::Encoder { kind: TrackKind::Audio, .. }));
        assert_eq!(session.state(), SessionState::Stopped);

        assert!(dir.path().join("video0.webm").exists());
        assert!(dir.path().join("audio0.webm").exists());
        assert!(dir.path().join(MANIFEST_FILENAME).exists());
    }

    #[tokio::test]
    async fn mismatched_feeds_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let session = DashWebmStreaming::new(config(dir.path(), false));
        session.start().await.unwrap();

        let (_video_tx, video_rx) = encoder_channel(TrackKind::Video, 1);
        let (_audio_tx, audio_rx) = encoder_channel(TrackKind::Audio, 1);
        let result = session
            .encode_and_publish(EncoderFeeds { video: video_rx, audio: Some(audio_rx) })
            .await;
        assert!(matches!(result, Err(StreamError::Config(_))));
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn stop_before_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let session = DashWebmStreaming::new(config(dir.path(), false));
        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(matches!(
            session.start().await,
            Err(StreamError::InvalidState { current: SessionState::Stopped, .. })
        ));
    }
}
