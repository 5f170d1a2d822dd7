use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use webm_box::writer::{VP8_CODEC_ID, VP9_CODEC_ID};

use crate::error::{Result, StreamError};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogLevel {
    Trace = 0, // Designates very fine-grained informational events, extremely verbose.
    Debug = 1, // Designates fine-grained informational events.
    Info = 2, // Designates informational messages.
    Warn = 3, // Designates hazardous situations.
    Error = 4, // Designates very serious errors.
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    Vp8,
    Vp9,
}

impl VideoCodec {
    /// Matroska CodecID
    pub fn codec_id(self) -> &'static str {
        match self {
            VideoCodec::Vp8 => VP8_CODEC_ID,
            VideoCodec::Vp9 => VP9_CODEC_ID,
        }
    }

    /// DASH `codecs` attribute
    pub fn dash_codecs(self) -> &'static str {
        match self {
            VideoCodec::Vp8 => "vp8",
            VideoCodec::Vp9 => "vp9",
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "webm-dash-server")]
pub struct Args {
    // Set the port number
    #[arg(short, long)]
    pub port: Option<u16>,
    // Set the log level (possible values: error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,
    /// JSON session configuration; command-line flags take precedence over it
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Segment rotation interval in milliseconds
    #[arg(short, long)]
    pub interval_ms: Option<u64>,
    /// Video bitrate in bits per second
    #[arg(long)]
    pub video_bitrate: Option<u32>,
    #[arg(long)]
    pub frame_rate: Option<u32>,
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    #[arg(long, value_enum)]
    pub codec: Option<VideoCodec>,
    /// Audio bitrate in bits per second
    #[arg(long)]
    pub audio_bitrate: Option<u32>,
    /// Also stream an Opus audio track
    #[arg(long)]
    pub record_audio: bool,
    /// Directory the segments and manifest are written to and served from
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

/// Parameters of one streaming session. Fixed once the session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub port: u16,
    pub interval_ms: u64,
    pub video_bitrate: u32,
    pub video_frame_rate: u32,
    pub video_width: u32,
    pub video_height: u32,
    pub video_codec: VideoCodec,
    pub audio_bitrate: u32,
    pub record_audio: bool,
    pub output_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: 2000,
            interval_ms: 1_000,
            video_bitrate: 1_500_000,
            video_frame_rate: 30,
            video_width: 1280,
            video_height: 720,
            video_codec: VideoCodec::Vp9,
            audio_bitrate: 128_000,
            record_audio: false,
            output_dir: PathBuf::from("dist"),
        }
    }
}

impl SessionConfig {
    /// Defaults, then the JSON file from `--config`, then explicit command-line flags.
    #[instrument(skip_all)]
    pub fn load(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate()?;
        info!(?config, "Session configuration loaded");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| StreamError::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| StreamError::Config(format!("{}: {}", path.display(), e)))
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(interval_ms) = args.interval_ms {
            self.interval_ms = interval_ms;
        }
        if let Some(bitrate) = args.video_bitrate {
            self.video_bitrate = bitrate;
        }
        if let Some(frame_rate) = args.frame_rate {
            self.video_frame_rate = frame_rate;
        }
        if let Some(width) = args.width {
            self.video_width = width;
        }
        if let Some(height) = args.height {
            self.video_height = height;
        }
        if let Some(codec) = args.codec {
            self.video_codec = codec;
        }
        if let Some(bitrate) = args.audio_bitrate {
            self.audio_bitrate = bitrate;
        }
        if args.record_audio {
            self.record_audio = true;
        }
        if let Some(output_dir) = &args.output_dir {
            self.output_dir = output_dir.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(StreamError::Config("interval_ms must be positive".into()));
        }
        if self.video_frame_rate == 0 {
            return Err(StreamError::Config("video_frame_rate must be positive".into()));
        }
        if self.video_width == 0 || self.video_height == 0 {
            return Err(StreamError::Config(format!(
                "invalid resolution {}x{}",
                self.video_width, self.video_height
            )));
        }
        Ok(())
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 2000);
        assert_eq!(config.video_codec, VideoCodec::Vp9);
        assert!(!config.record_audio);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "interval_ms": 2000, "video_codec": "vp8", "record_audio": true }}"#
        )
        .unwrap();

        let config = SessionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.interval_ms, 2000);
        assert_eq!(config.video_codec, VideoCodec::Vp8);
        assert!(config.record_audio);
        assert_eq!(config.video_width, 1280);
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "port": 9000, "video_width": 640 }}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::try_parse_from([
            "webm-dash-server",
            "--config",
            &path,
            "--port",
            "8080",
            "--codec",
            "vp8",
        ])
        .unwrap();
        let config = SessionConfig::load(&args).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.video_width, 640);
        assert_eq!(config.video_codec, VideoCodec::Vp8);
    }

    #[test]
    fn rejects_zero_interval_and_bad_json() {
        let args = Args::try_parse_from(["webm-dash-server", "--interval-ms", "0"]).unwrap();
        assert!(matches!(SessionConfig::load(&args), Err(StreamError::Config(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(SessionConfig::from_file(file.path()), Err(StreamError::Config(_))));
    }

    #[test]
    fn codec_names() {
        assert_eq!(VideoCodec::Vp8.codec_id(), "V_VP8");
        assert_eq!(VideoCodec::Vp9.dash_codecs(), "vp9");
    }
}
