use thiserror::Error;

/// Stage of the external model a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStage {
    Train,
    Evaluate,
    Predict,
}

impl std::fmt::Display for ModelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModelStage::Train => "train",
            ModelStage::Evaluate => "evaluate",
            ModelStage::Predict => "predict",
        };
        write!(f, "{}", s)
    }
}

/// Errors surfaced by the sampling and training pipeline.
///
/// Configuration and data errors fail fast before any sampling begins; model
/// errors abort the run with the failing stage identified and are never
/// retried.
#[derive(Debug, Error)]
pub enum SembError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("model failure during {stage}: {message}")]
    Model { stage: ModelStage, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse input: {0}")]
    Parse(String),
}

impl SembError {
    /// Shorthand for a model failure at the given stage.
    pub fn model(stage: ModelStage, message: impl Into<String>) -> Self {
        SembError::Model {
            stage,
            message: message.into(),
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, SembError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SembError::InvalidConfiguration("k must be >= 1".to_string());
        assert!(format!("{}", err).contains("invalid configuration"));
        assert!(format!("{}", err).contains("k must be >= 1"));

        let err = SembError::InsufficientData("no labeled samples".to_string());
        assert!(format!("{}", err).contains("insufficient data"));

        let err = SembError::model(ModelStage::Evaluate, "shape mismatch");
        assert!(format!("{}", err).contains("evaluate"));
        assert!(format!("{}", err).contains("shape mismatch"));
    }
}
