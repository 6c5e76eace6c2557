use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum EstimatorError {
    #[error("reading source failed: {0}")]
    Source(String),
    #[error("feed disconnected unexpectedly")]
    FeedDisconnected,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("persistence error: {0}")]
    Persist(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("invalid parameter {name}: {reason}")]
    InvalidParam {
        name: &'static str,
        reason: &'static str,
    },
    #[error("restored volume must be finite and >= 0, got {0}")]
    InvalidRestoredVolume(f64),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
