//! Error types

use thiserror::Error;

use crate::alloc::AllocError;

/// Error type for element access and transitions
#[derive(Error, Debug)]
pub enum ElementsError {
    /// Read past the end of an array
    #[error("index {index} out of range for length {length}")]
    IndexOutOfRange {
        /// The index that was accessed
        index: usize,
        /// The length of the array at the time of the access
        length: usize,
    },
    /// Allocation failed while growing or re-encoding an element buffer.
    /// The store involved is left unchanged.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(#[from] AllocError),
    /// Configuration or feedback snapshot could not be (de)serialized
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate
pub type Result<T, E = ElementsError> = std::result::Result<T, E>;
