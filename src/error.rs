//! Error types shared by every reader in the crate.

use thiserror::Error;

use crate::backend::BackendError;
use crate::io::ByteRange;

/// Errors for all read, seek and size operations.
///
/// Reaching the end of the object is not an error: it is reported through
/// [`ReadStatus::EndOfData`](crate::io::ReadStatus::EndOfData).
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("metadata request for {location} failed")]
    Metadata {
        location: String,
        #[source]
        source: BackendError,
    },

    #[error("invalid metadata for {location}: {reason}")]
    InvalidMetadata { location: String, reason: String },

    #[error("range request {range} for {location} failed")]
    Fetch {
        location: String,
        range: ByteRange,
        #[source]
        source: BackendError,
    },

    #[error("transport error while reading {range} of {location}")]
    Transport {
        location: String,
        range: ByteRange,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    /// Whether the error came from the caller aborting the operation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
