use thiserror::Error;

/// Configuration rejected before the pipeline runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid background key: {0}")]
    InvalidBackgroundKey(String),

    #[error("invalid structuring element for {stage}: {reason}")]
    InvalidKernel { stage: &'static str, reason: String },

    #[error("invalid threshold `{name}` = {value} (must be finite and >= 0)")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("invalid seed-confidence fraction {0} (must lie in [0, 1))")]
    InvalidFraction(f64),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}
