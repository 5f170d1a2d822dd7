mod error;
mod pipeline;
mod registry;
mod server;

pub use error::MetricsError;
pub use pipeline::PipelineGauges;
pub use registry::{get_metrics, install_global, Metrics, MetricsBuilder};
pub use server::{encode_metrics, metrics_handler};
