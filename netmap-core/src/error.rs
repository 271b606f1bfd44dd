use netmap_archive::ArchiveError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkMapError {
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store {0} is closed")]
    Closed(String),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Indexing task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid resource line: {0}")]
    InvalidLine(String),
}

pub type Result<T> = std::result::Result<T, NetworkMapError>;
