use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("metrics instance already initialized")]
    AlreadyInitialized,

    #[error("metrics lock poisoned")]
    LockPoisoned,
}
