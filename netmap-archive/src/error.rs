use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to open archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid record header: {0}")]
    InvalidHeader(String),

    #[error("Truncated record: {0}")]
    Truncated(String),

    #[error("Recoverable parse error: {0}")]
    RecoverableParse(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ArchiveError {
    /// Errors confined to a single record; the rest of the file is still usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ArchiveError::RecoverableParse(_))
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
