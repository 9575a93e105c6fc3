use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`crate::MemReader`].
#[derive(Error, Debug)]
pub enum Error {
    /// The file could not be memory mapped (missing, no permission, empty or the `mmap` failed).
    #[error("failed to map {path:?}: {source}")]
    MapFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The request would move past the end of the mapped file. The cursor was not moved.
    #[error("tried to access {requested} bytes at offset {offset} past end of file ({len} bytes)")]
    OutOfBounds {
        offset: usize,
        requested: usize,
        len: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
