use tracing::debug;

use super::{ReadAt, ReadOutcome};
use crate::error::{Error, Result};

/// Reference point of a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

impl TryFrom<i64> for Whence {
    type Error = Error;

    /// Decode the numeric codes `0` (start), `1` (current) and `2` (end).
    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Whence::Start),
            1 => Ok(Whence::Current),
            2 => Ok(Whence::End),
            _ => Err(Error::InvalidArgument(format!(
                "whence must be 0, 1 or 2, got {value}"
            ))),
        }
    }
}

/// Sequential reads over any [`ReadAt`], with a movable cursor.
///
/// The cursor is plain mutable state, so a `SeekableReader` belongs to one
/// caller; share the inner reader instead if several callers need access.
pub struct SeekableReader<R> {
    inner: R,
    position: u64,
}

impl<R: ReadAt> SeekableReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Move the cursor and return its new absolute position.
    ///
    /// Seeking past the end is allowed; the next read then reports
    /// end-of-data right away. A position before the start of the object is
    /// rejected and leaves the cursor where it was.
    pub async fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => self.position,
            Whence::End => self.inner.size().await?,
        };

        let position = base.checked_add_signed(offset).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "cannot seek {offset} bytes from {whence:?} (base {base})"
            ))
        })?;

        debug!(offset, ?whence, position, "seek");
        self.position = position;
        Ok(position)
    }

    /// Read at the cursor and advance it by the number of bytes read.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        let outcome = self.inner.read_at(self.position, buf).await?;
        self.position = self.position.saturating_add(outcome.len as u64);
        Ok(outcome)
    }
}
