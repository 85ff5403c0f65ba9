use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be greater than zero")]
    ZeroCapacity { name: &'static str },
    #[error("{name} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },
    #[error("anomaly sigma must be a positive finite number, got {0}")]
    InvalidSigma(f64),
    #[error("{name} must be a non-zero duration")]
    ZeroDuration { name: &'static str },
}

/// Failure to hand a payload to the push channel. Always reported, never fatal.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("no subscribers attached")]
    NoSubscribers,
    #[error("push channel disconnected")]
    Disconnected,
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write payload: {0}")]
    Io(#[from] std::io::Error),
}
