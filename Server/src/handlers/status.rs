// handlers/status.rs

use axum::extract::{Json, State};
use serde::Serialize;
use tracing::instrument;

use crate::config::SessionConfig;
use crate::services::session::{SessionState, StreamingStrategy};
use crate::types::{AppState, TrackKind};

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub config: SessionConfig,
    pub video_segments: Vec<String>,
    pub audio_segments: Vec<String>,
}

fn segment_names(state: &AppState, kind: TrackKind) -> Vec<String> {
    state
        .session
        .content()
        .published(kind)
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

/// Session state, configuration and the segments currently in the retention window.
#[instrument(skip_all)]
pub async fn session_status(State(state): State<AppState>) -> Json<SessionStatus> {
    Json(SessionStatus {
        state: state.session.state(),
        config: state.session.config().clone(),
        video_segments: segment_names(&state, TrackKind::Video),
        audio_segments: segment_names(&state, TrackKind::Audio),
    })
}
