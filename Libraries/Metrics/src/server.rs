use axum::http::StatusCode;
use prometheus::{Encoder, Registry, TextEncoder};

use crate::get_metrics;

/// Prometheus text exposition of `registry`.
pub fn encode_metrics(registry: &Registry) -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Handler function for the /metrics endpoint.
pub async fn metrics_handler() -> Result<String, StatusCode> {
    let metrics = get_metrics().ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    encode_metrics(metrics.registry()).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
