//! Errors raised while turning a request into a wine quality prediction.

/// The two ways an evaluation can fail.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// The scaler or the model could not be loaded. Every evaluation fails
    /// with this until the artifacts are reloaded.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// A sample field was missing, non-numeric or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl EvalError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        EvalError::InvalidInput(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        EvalError::ModelUnavailable(msg.into())
    }

    /// Prefix an InvalidInput message with the position of the failing sample
    /// inside a batch (1-based).
    pub fn at_sample(self, index: usize) -> Self {
        match self {
            EvalError::InvalidInput(msg) => {
                EvalError::InvalidInput(format!("sample {}: {}", index + 1, msg))
            }
            other => other,
        }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
