//! Error taxonomy for image lookups and reads.
//!
//! Absence (a path that does not exist, is malformed, or names a hidden
//! artifact) is never an error; it surfaces as `None` from
//! [`ImageFs::find`](crate::image::ImageFs::find). Errors are reserved for
//! kind mismatches and for backing-store failures on paths the image already
//! believed to exist.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Child listing was requested on a resource or link node.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Content was requested from a directory or link node.
    #[error("not a resource: {0}")]
    NotAResource(String),

    /// The backing tree failed underneath us after construction-time
    /// assumptions were made. Carries the offending on-disk path.
    #[error("i/o failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be read or parsed.
    #[error("config: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
