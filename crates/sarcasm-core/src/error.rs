//! Error types for the sarcasm classifier

/// Result type alias using the classifier's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for training, evaluation and inference
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or missing fields in the input dataset
    #[error("data error: {0}")]
    Data(String),

    /// Tokenizer construction or encoding failures
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Tensor, device and model execution failures
    #[error("model error: {0}")]
    Model(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Checkpoint persistence errors
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new data error
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    /// Create a new tokenizer error
    pub fn tokenizer(msg: impl Into<String>) -> Self {
        Self::Tokenizer(msg.into())
    }

    /// Create a new model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new checkpoint error
    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
