// Encoder feed: the capture/encode side pushes one event per access unit into a
// bounded channel per track, and a feed task drains it into the segment writer.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{Result, StreamError};
use crate::services::segment_writer::{AppendOutcome, SegmentWriter};
use crate::types::{EncodedSample, TrackKind};

/// Access units buffered per track before the encoder side has to wait.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

#[derive(Debug)]
pub enum EncoderEvent {
    Sample(EncodedSample),
    /// The encoder stopped producing output; ends the session.
    Failed(String),
}

#[derive(Debug, Error)]
#[error("encoder feed for the {0} track is closed")]
pub struct FeedClosed(pub TrackKind);

#[derive(Debug, Clone)]
pub struct EncoderSender {
    kind: TrackKind,
    tx: mpsc::Sender<EncoderEvent>,
}

impl EncoderSender {
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Hand over one encoded access unit. Waits while the feed is full.
    pub async fn send_sample(
        &self,
        payload: Bytes,
        presentation_time_us: i64,
        is_keyframe: bool,
    ) -> std::result::Result<(), FeedClosed> {
        let sample = EncodedSample {
            kind: self.kind,
            payload,
            presentation_time_us,
            is_keyframe,
        };
        self.tx
            .send(EncoderEvent::Sample(sample))
            .await
            .map_err(|_| FeedClosed(self.kind))
    }

    pub async fn fail(&self, reason: impl Into<String>) -> std::result::Result<(), FeedClosed> {
        self.tx
            .send(EncoderEvent::Failed(reason.into()))
            .await
            .map_err(|_| FeedClosed(self.kind))
    }
}

#[derive(Debug)]
pub struct EncoderReceiver {
    kind: TrackKind,
    rx: mpsc::Receiver<EncoderEvent>,
}

impl EncoderReceiver {
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub async fn next_event(&mut self) -> Option<EncoderEvent> {
        self.rx.recv().await
    }
}

pub fn encoder_channel(kind: TrackKind, capacity: usize) -> (EncoderSender, EncoderReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (EncoderSender { kind, tx }, EncoderReceiver { kind, rx })
}

/// Drain `receiver` into `writer` until `cancel` fires.
///
/// Returns the number of samples muxed. A failure event, a closed channel or a
/// muxing error ends the feed with an error.
#[instrument(skip_all, fields(kind = %receiver.kind))]
pub async fn run_feed(
    mut receiver: EncoderReceiver,
    writer: Arc<SegmentWriter>,
    cancel: CancellationToken,
) -> Result<u64> {
    let kind = receiver.kind;
    let mut muxed = 0u64;

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = receiver.next_event() => event,
        };

        match event {
            Some(EncoderEvent::Sample(sample)) => {
                if sample.kind != kind {
                    warn!("Ignoring {} sample on the {} feed", sample.kind, kind);
                    continue;
                }
                if writer.append_encoded_data(&sample).await? == AppendOutcome::Appended {
                    muxed += 1;
                }
            }
            Some(EncoderEvent::Failed(reason)) => {
                return Err(StreamError::encoder(kind, reason));
            }
            None if cancel.is_cancelled() => break,
            None => return Err(StreamError::encoder(kind, "encoder channel closed")),
        }
    }

    debug!("Feed stopped after {} samples", muxed);
    Ok(muxed)
}

#[cfg(test)]
mod tests {
    use webm_box::elements::track_entry::TrackEntry;

    use super::*;

    fn writer() -> Arc<SegmentWriter> {
        Arc::new(SegmentWriter::new(TrackEntry::video(1, "V_VP9", 64, 64), None))
    }

    #[tokio::test]
    async fn feed_muxes_until_cancelled() {
        let writer = writer();
        let cancel = CancellationToken::new();
        let (tx, rx) = encoder_channel(TrackKind::Video, 8);
        let feed = tokio::spawn(run_feed(rx, writer.clone(), cancel.clone()));

        tx.send_sample(Bytes::from_static(b"d"), 0, false).await.unwrap();
        tx.send_sample(Bytes::from_static(b"k"), 10_000, true).await.unwrap();
        tx.send_sample(Bytes::from_static(b"d"), 20_000, false).await.unwrap();

        while writer.pending_chunks(TrackKind::Video).await.unwrap() < 2 {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        assert_eq!(feed.await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn failure_event_is_an_encoder_error() {
        let (tx, rx) = encoder_channel(TrackKind::Video, 8);
        tx.fail("codec reset").await.unwrap();

        let error = run_feed(rx, writer(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            error,
            StreamError::Encoder { kind: TrackKind::Video, ref reason } if reason == "codec reset"
        ));
    }

    #[tokio::test]
    async fn closed_channel_is_an_encoder_error() {
        let (tx, rx) = encoder_channel(TrackKind::Video, 8);
        drop(tx);
        let error = run_feed(rx, writer(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(error, StreamError::Encoder { .. }));
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_reports_closed() {
        let (tx, rx) = encoder_channel(TrackKind::Audio, 1);
        drop(rx);
        assert!(tx.send_sample(Bytes::new(), 0, true).await.is_err());
    }
}
