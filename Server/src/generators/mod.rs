// generators/mod.rs
//
// Synthetic stand-in for the capture/encode side: emits encoder-shaped access
// units on a fixed cadence so the server can run without a real encoder.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::SessionConfig;
use crate::ingress::EncoderSender;
use crate::types::TrackKind;

/// Opus packets carry 20 ms of audio.
pub const OPUS_PACKET_DURATION: Duration = Duration::from_millis(20);

#[derive(Debug, Serialize, Deserialize, PartialEq, Copy, Clone)]
pub enum GeneratorName {
    /// Random bytes, sized from the configured bitrate.
    Noise = 0,
    /// All-zero payloads of the same size.
    Silence,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSource {
    pub kind: TrackKind,
    pub name: GeneratorName,
    pub frame_duration: Duration,
    /// Every n-th access unit is a keyframe.
    pub keyframe_interval: u64,
    pub payload_size: usize,
}

impl SyntheticSource {
    /// Video at the configured frame rate with a keyframe every two seconds.
    pub fn video(config: &SessionConfig) -> Self {
        let fps = config.video_frame_rate.max(1);
        Self {
            kind: TrackKind::Video,
            name: GeneratorName::Noise,
            frame_duration: Duration::from_secs(1) / fps,
            keyframe_interval: fps as u64 * 2,
            payload_size: (config.video_bitrate / 8 / fps).max(1) as usize,
        }
    }

    pub fn audio(config: &SessionConfig) -> Self {
        let packets_per_second = (Duration::from_secs(1).as_millis() / OPUS_PACKET_DURATION.as_millis()) as u32;
        Self {
            kind: TrackKind::Audio,
            name: GeneratorName::Silence,
            frame_duration: OPUS_PACKET_DURATION,
            keyframe_interval: 1,
            payload_size: (config.audio_bitrate / 8 / packets_per_second).max(1) as usize,
        }
    }

    pub fn is_keyframe(&self, frame: u64) -> bool {
        frame % self.keyframe_interval.max(1) == 0
    }

    /// Payload of access unit `frame`. The first byte carries the frame number
    /// so payloads stay distinguishable.
    pub fn payload(&self, frame: u64, rng: &mut impl RngCore) -> Bytes {
        let mut payload = BytesMut::with_capacity(self.payload_size);
        payload.put_u8(frame as u8);
        let mut body = vec![0u8; self.payload_size.saturating_sub(1)];
        if self.name == GeneratorName::Noise {
            rng.fill_bytes(&mut body);
        }
        payload.put_slice(&body);
        payload.freeze()
    }

    /// Emit access units until `cancel` fires or the feed closes. Presentation
    /// times come from a monotonic clock, in microseconds since the first unit.
    #[instrument(skip_all, fields(kind = %self.kind))]
    pub async fn run(self, sender: EncoderSender, cancel: CancellationToken) -> u64 {
        let mut rng = StdRng::from_entropy();
        let mut ticker = time::interval(self.frame_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let started = Instant::now();
        let mut frame = 0u64;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let presentation_time_us = started.elapsed().as_micros() as i64;
            let payload = self.payload(frame, &mut rng);
            if sender
                .send_sample(payload, presentation_time_us, self.is_keyframe(frame))
                .await
                .is_err()
            {
                break;
            }
            frame += 1;
        }

        debug!("Generated {} access units", frame);
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingress::{encoder_channel, EncoderEvent};

    #[test]
    fn video_cadence_follows_config() {
        let config = SessionConfig::default();
        let source = SyntheticSource::video(&config);
        assert_eq!(source.keyframe_interval, 60);
        assert_eq!(source.payload_size, 1_500_000 / 8 / 30);
        assert!(source.is_keyframe(0));
        assert!(!source.is_keyframe(59));
        assert!(source.is_keyframe(120));
    }

    #[test]
    fn audio_packets_are_all_keyframes() {
        let source = SyntheticSource::audio(&SessionConfig::default());
        assert_eq!(source.frame_duration, Duration::from_millis(20));
        assert_eq!(source.payload_size, 128_000 / 8 / 50);
        assert!((0..10).all(|frame| source.is_keyframe(frame)));

        let payload = source.payload(3, &mut StdRng::seed_from_u64(1));
        assert_eq!(payload.len(), source.payload_size);
        assert_eq!(payload[0], 3);
        assert!(payload[1..].iter().all(|b| *b == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn emits_monotonic_timestamps() {
        let source = SyntheticSource::video(&SessionConfig::default());
        let (tx, mut rx) = encoder_channel(TrackKind::Video, 64);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(source.run(tx, cancel.clone()));

        let mut previous = -1;
        for frame in 0..10 {
            match rx.next_event().await {
                Some(EncoderEvent::Sample(sample)) => {
                    assert!(sample.presentation_time_us > previous);
                    assert_eq!(sample.is_keyframe, frame == 0);
                    previous = sample.presentation_time_us;
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        cancel.cancel();
        assert!(task.await.unwrap() >= 10);
    }
}
