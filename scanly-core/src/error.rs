use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanlyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<notify::Error> for ScanlyError {
    fn from(err: notify::Error) -> Self {
        ScanlyError::Watch(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanlyError>;
