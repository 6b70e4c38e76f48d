use std::path::PathBuf;
use thiserror::Error;

/// Failures that stop a batch as a whole
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("input directory not found: {}", .0.display())]
    InputDirMissing(PathBuf),
    #[error("cannot prepare output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot list input directory {}: {source}", .path.display())]
    ListInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("batch aborted at {}: {reason}", .file.display())]
    Aborted { file: PathBuf, reason: String },
}

pub type BatchResult<T> = Result<T, BatchError>;
