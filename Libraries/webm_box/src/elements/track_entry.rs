use byteorder::{ByteOrder, LittleEndian};

use super::generic::{EbmlElement, WebmElement};
use super::tags::MatroskaTag;

pub const OPUS_HEAD_LENGTH: usize = 19;
pub const OPUS_HEAD_MAGIC: &[u8; 8] = b"OpusHead";
pub const OPUS_HEAD_VERSION: u8 = 0x01;

// Matroska TrackType values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    Video = 1,
    Audio = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSettings {
    pub pixel_width: u32,
    pub pixel_height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSettings {
    pub sampling_frequency: f32,
    pub channels: u8,
}

// The `TrackEntry` struct describes one elementary stream of the Segment.
//
// Fields:
// - `track_number`: the number SimpleBlocks refer to (1 for video, 2 for audio here).
// - `track_uid`: a non-zero identifier, equal to the track number by default.
// - `codec_id`: "V_VP8", "V_VP9" or "A_OPUS".
// - `track_type`: video or audio.
// - `codec_private`: codec initialization data (the Opus identification header for audio).
// - `video` / `audio`: the type-specific settings; exactly one is set.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEntry {
    pub track_number: u32,
    pub track_uid: u32,
    pub codec_id: String,
    pub track_type: TrackType,
    pub codec_private: Option<Vec<u8>>,
    pub video: Option<VideoSettings>,
    pub audio: Option<AudioSettings>,
}

impl TrackEntry {
    pub fn video(track_number: u32, codec_id: &str, pixel_width: u32, pixel_height: u32) -> Self {
        TrackEntry {
            track_number,
            track_uid: track_number,
            codec_id: codec_id.to_string(),
            track_type: TrackType::Video,
            codec_private: None,
            video: Some(VideoSettings {
                pixel_width,
                pixel_height,
            }),
            audio: None,
        }
    }

    pub fn opus(track_number: u32, channels: u8, sampling_frequency: f32) -> Self {
        TrackEntry {
            track_number,
            track_uid: track_number,
            codec_id: crate::writer::OPUS_CODEC_ID.to_string(),
            track_type: TrackType::Audio,
            codec_private: Some(opus_head(channels, sampling_frequency as u32).to_vec()),
            video: None,
            audio: Some(AudioSettings {
                sampling_frequency,
                channels,
            }),
        }
    }
}

impl WebmElement for TrackEntry {
    fn tag(&self) -> MatroskaTag {
        MatroskaTag::TrackEntry
    }

    fn payload(&self) -> Vec<u8> {
        let mut children = vec![
            EbmlElement::uint(MatroskaTag::TrackNumber, self.track_number as u64),
            EbmlElement::uint(MatroskaTag::TrackUid, self.track_uid as u64),
            EbmlElement::ascii(MatroskaTag::CodecId, &self.codec_id),
            EbmlElement::uint(MatroskaTag::TrackType, self.track_type as u64),
        ];

        if let Some(codec_private) = &self.codec_private {
            children.push(EbmlElement::new(MatroskaTag::CodecPrivate, codec_private.clone()));
        }

        if let Some(video) = &self.video {
            children.push(EbmlElement::master(
                MatroskaTag::Video,
                &[
                    EbmlElement::uint(MatroskaTag::PixelWidth, video.pixel_width as u64),
                    EbmlElement::uint(MatroskaTag::PixelHeight, video.pixel_height as u64),
                ],
            ));
        }

        if let Some(audio) = &self.audio {
            children.push(EbmlElement::master(
                MatroskaTag::Audio,
                &[
                    EbmlElement::float(MatroskaTag::SamplingFrequency, audio.sampling_frequency),
                    EbmlElement::uint(MatroskaTag::Channels, audio.channels as u64),
                ],
            ));
        }

        super::generic::concat_elements(&children)
    }
}

/// Builds the 19-byte Opus identification header (RFC 7845, section 5.1) carried as
/// CodecPrivate: magic, version, channel count, pre-skip 0, input sample rate (little endian),
/// output gain 0, channel mapping family 0.
pub fn opus_head(channels: u8, input_sample_rate: u32) -> [u8; OPUS_HEAD_LENGTH] {
    let mut head = [0u8; OPUS_HEAD_LENGTH];
    head[..8].copy_from_slice(OPUS_HEAD_MAGIC);
    head[8] = OPUS_HEAD_VERSION;
    head[9] = channels;
    LittleEndian::write_u16(&mut head[10..12], 0);
    LittleEndian::write_u32(&mut head[12..16], input_sample_rate);
    LittleEndian::write_i16(&mut head[16..18], 0);
    head[18] = 0;
    head
}
