use std::path::PathBuf;

use thiserror::Error;

/// Fatal problems that abort one file or one traversal branch, never the whole run.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("expected directory '{}' is missing", path.display())]
    MissingDirectory { path: PathBuf },

    #[error("file name '{}' is not of the form <assignment>_<problem>.<ext>", path.display())]
    InvalidFileName { path: PathBuf },
}

impl ExtractError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractError::Io {
            path: path.into(),
            source,
        }
    }

    /// Path of the file or directory the error is about.
    pub fn path(&self) -> &std::path::Path {
        match self {
            ExtractError::Io { path, .. }
            | ExtractError::MissingDirectory { path }
            | ExtractError::InvalidFileName { path } => path,
        }
    }
}

pub type ExtractResult<T> = std::result::Result<T, ExtractError>;
