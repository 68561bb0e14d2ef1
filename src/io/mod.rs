mod cache;
mod range;
mod reader;
mod seek;

pub use cache::{CachePolicy, CachedReader};
pub use range::ByteRange;
pub use reader::RangeReader;
pub use seek::{SeekableReader, Whence};

use async_trait::async_trait;

use crate::error::Result;

/// How a read ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// Every requested byte was read and more may follow.
    Complete,
    /// The bytes read reach the end of the object; nothing follows them.
    EndOfData,
}

/// Result of a successful read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Number of bytes written to the start of the caller's buffer.
    pub len: usize,
    pub status: ReadStatus,
}

impl ReadOutcome {
    pub fn complete(len: usize) -> Self {
        Self {
            len,
            status: ReadStatus::Complete,
        }
    }

    pub fn end_of_data(len: usize) -> Self {
        Self {
            len,
            status: ReadStatus::EndOfData,
        }
    }

    pub fn is_end_of_data(&self) -> bool {
        self.status == ReadStatus::EndOfData
    }
}

/// Trait for random access reading from a remote object
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read up to `buf.len()` bytes starting at absolute byte `offset`.
    ///
    /// A read cut short by the end of the object reports
    /// [`ReadStatus::EndOfData`] together with the bytes it did read.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<ReadOutcome>;

    /// Get the total size of the object
    async fn size(&self) -> Result<u64>;
}
