pub type LabResult<T> = Result<T, LabError>;

#[derive(thiserror::Error, Debug)]
pub enum LabError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("sandbox error: {0}")]
    Sandbox(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LabError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn sandbox(msg: impl Into<String>) -> Self {
        Self::Sandbox(msg.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}
