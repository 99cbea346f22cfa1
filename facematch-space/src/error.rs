use thiserror::Error;

pub type Result<T, E = SpaceError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SpaceError {
    /// Projection or matching was requested before a snapshot was installed.
    #[error("feature space not initialized")]
    NotInitialized,

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Persisted model or dataset artifacts are absent or inconsistent.
    #[error("model files missing or incomplete: {0}")]
    ModelFilesMissing(String),

    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

impl SpaceError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn missing(msg: impl Into<String>) -> Self {
        Self::ModelFilesMissing(msg.into())
    }
}
