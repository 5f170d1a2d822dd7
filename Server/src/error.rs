use std::path::{Path, PathBuf};

use dash_mpd::MpdError;
use thiserror::Error;
use webm_box::MuxError;

use crate::services::session::SessionState;
use crate::types::TrackKind;

pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors that end (or prevent) a streaming session.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("muxing failed: {0}")]
    Mux(#[from] MuxError),

    #[error("manifest generation failed: {0}")]
    Manifest(#[from] MpdError),

    #[error("{kind} encoder failed: {reason}")]
    Encoder { kind: TrackKind, reason: String },

    #[error("{0} track is not enabled for this session")]
    TrackDisabled(TrackKind),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("session is {current:?}, expected {expected:?}")]
    InvalidState {
        current: SessionState,
        expected: SessionState,
    },

    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl StreamError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn encoder(kind: TrackKind, reason: impl Into<String>) -> Self {
        Self::Encoder {
            kind,
            reason: reason.into(),
        }
    }
}
