//! Error types for OxbowDB.

use crate::page::PageNum;
use thiserror::Error;

/// Result type alias using OxbowError.
pub type Result<T> = std::result::Result<T, OxbowError>;

/// Errors that can occur in OxbowDB operations.
#[derive(Debug, Error)]
pub enum OxbowError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("page {0} is beyond the end of the page file")]
    ReadOutOfBounds(PageNum),

    // Pool lifecycle errors
    #[error("operation on a buffer pool that is not open")]
    PoolNotOpen,

    #[error("shutdown called on a buffer pool that is already closed")]
    PoolAlreadyClosed,

    #[error("cannot shut down buffer pool: {count} pages still pinned")]
    PinnedPagesInBuffer { count: usize },

    // Pin contract errors
    #[error("negative page number: {0}")]
    NegativePageNum(PageNum),

    #[error("page {0} is not resident in the buffer pool")]
    PageNotResident(PageNum),

    #[error("page {0} is not pinned")]
    PageNotPinned(PageNum),

    #[error("every frame is pinned, no frame can be evicted")]
    NoEvictableFrame,
}
