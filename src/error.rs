use std::path::PathBuf;

use thiserror::Error;

use crate::jobs::JobKind;

#[derive(Error, Debug)]
pub enum OrganiseError {
    #[error("Folder does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("No read/write permissions for {}", .0.display())]
    AccessDenied(PathBuf),

    #[error("{0} already in progress")]
    Busy(JobKind),

    #[error("Failed to parse config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OrganiseError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrganiseError>;
