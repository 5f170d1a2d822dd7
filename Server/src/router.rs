use axum::{http::Request, routing::get, Router};
use metrics::metrics_handler;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::instrument;

use crate::handlers::{index, status};
use crate::types::{AppState, WEBM_EXTENSION};

// Polled continuously by players and scrapers; logging every hit drowns the rest.
fn is_quiet_path(path: &str) -> bool {
    path == "/metrics"
        || path
            .rsplit_once('.')
            .is_some_and(|(_, extension)| extension == WEBM_EXTENSION)
}

#[instrument(skip_all)]
pub fn create_router(app_state: AppState) -> Router {
    let output_dir = app_state.session.content().output_dir().to_path_buf();

    Router::new()
        // Player page
        .route("/", get(index::serve_index))
        // Session status
        .route("/status", get(status::session_status))
        // Metrics endpoint
        .route("/metrics", get(metrics_handler))
        // Manifest, init and media segments
        .fallback_service(ServeDir::new(output_dir))
        // Apply middleware
        .layer(
            // We allow cross-origin requests from any origin
            CorsLayer::permissive(),
        )
        .layer(
            // Add logging middleware
            ServiceBuilder::new().layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().include_headers(true))
                    .on_request(|request: &Request<axum::body::Body>, _span: &tracing::Span| {
                        if is_quiet_path(request.uri().path()) {
                            return;
                        }
                        tracing::info!("Received request for endpoint: {}", request.uri().path());
                    }),
            ),
        )
        // Share state
        .with_state(app_state)
}
