use std::path::PathBuf;

use thiserror::Error;

pub type PackagingResult<T> = Result<T, PackagingError>;

#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Build command `{command}` failed with exit code {}", .code.map_or_else(|| "none".to_owned(), |c| c.to_string()))]
    BuildFailed { command: String, code: Option<i32> },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("package archive {} does not exist; build it first", .0.display())]
    MissingArchive(PathBuf),

    #[error("packaging task aborted: {0}")]
    Task(String),
}

impl PackagingError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
