use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("destination directory does not exist: {}", .0.display())]
    DestinationMissing(PathBuf),

    #[error("file management system not initialized")]
    NotInitialized,

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("No file provided: '{0}' is empty")]
    EmptyUpload(String),

    #[error("file '{file_name}' is {size} bytes, above the {limit} byte limit")]
    FileTooLarge {
        file_name: String,
        size: u64,
        limit: u64,
    },

    #[error("ingesting {} timed out after {secs}s", .path.display())]
    TimedOut { path: PathBuf, secs: u64 },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
