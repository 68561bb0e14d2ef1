use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{ByteRange, RangeReader, ReadAt, ReadOutcome};
use crate::error::Result;

/// How much a cache miss fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// Minimum number of bytes fetched on a miss. Reads smaller than this
    /// fetch extra bytes after the requested window, so that the following
    /// sequential reads are served from memory. Zero fetches exactly what
    /// was asked for.
    pub readahead: usize,
}

impl CachePolicy {
    pub fn with_readahead(readahead: usize) -> Self {
        Self { readahead }
    }
}

/// Bytes and start offset of the most recent fetch.
struct CachedWindow {
    offset: u64,
    data: Vec<u8>,
}

impl CachedWindow {
    fn range(&self) -> Option<ByteRange> {
        ByteRange::from_offset(self.offset, self.data.len() as u64)
    }

    /// Copy `wanted` into `buf` if the window holds all of it.
    fn copy_to(&self, wanted: &ByteRange, buf: &mut [u8]) -> bool {
        match self.range() {
            Some(range) if range.contains(wanted) => {
                let start = (wanted.first() - self.offset) as usize;
                let len = wanted.len() as usize;
                buf[..len].copy_from_slice(&self.data[start..start + len]);
                true
            }
            _ => false,
        }
    }
}

/// A [`RangeReader`] remembering the last range it fetched.
///
/// Reads that fall entirely inside the remembered window are served from
/// memory. Every fetch replaces the window. The window lock is held for
/// the whole check-fetch-update sequence, so concurrent reads through one
/// `CachedReader` are serialized.
pub struct CachedReader {
    inner: RangeReader,
    policy: CachePolicy,
    window: Mutex<Option<CachedWindow>>,
}

impl CachedReader {
    pub fn new(inner: RangeReader, policy: CachePolicy) -> Self {
        Self {
            inner,
            policy,
            window: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &RangeReader {
        &self.inner
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Range currently held in memory, if any.
    pub async fn cached_range(&self) -> Option<ByteRange> {
        self.window.lock().await.as_ref().and_then(CachedWindow::range)
    }
}

#[async_trait]
impl ReadAt for CachedReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<ReadOutcome> {
        let Some(requested) = ByteRange::from_offset(offset, buf.len() as u64) else {
            return Ok(ReadOutcome::complete(0));
        };

        let mut window = self.window.lock().await;

        let size = self.inner.size().await?;
        let Some(wanted) = requested.clamp_to_size(size) else {
            return Ok(ReadOutcome::end_of_data(0));
        };
        let clamped = wanted != requested;
        let len = wanted.len() as usize;

        if let Some(cached) = window.as_ref() {
            if cached.copy_to(&wanted, buf) {
                debug!(object = %self.inner.handle(), range = %wanted, "cache hit");
                return Ok(if clamped {
                    ReadOutcome::end_of_data(len)
                } else {
                    ReadOutcome::complete(len)
                });
            }
            debug!(
                object = %self.inner.handle(),
                range = %wanted,
                cached = ?cached.range(),
                "cache miss"
            );
        } else {
            debug!(object = %self.inner.handle(), range = %wanted, "cache miss: cache empty");
        }

        let want = len.max(self.policy.readahead) as u64;
        let fetch_range = ByteRange::from_offset(wanted.first(), want)
            .and_then(|r| r.clamp_to_size(size))
            .unwrap_or(wanted);

        let mut data = vec![0u8; fetch_range.len() as usize];
        let fetched = self.inner.fetch(fetch_range, &mut data).await?;
        data.truncate(fetched.len);

        let copied = fetched.len.min(len);
        buf[..copied].copy_from_slice(&data[..copied]);
        *window = Some(CachedWindow {
            offset: fetch_range.first(),
            data,
        });

        if clamped || copied < len {
            Ok(ReadOutcome::end_of_data(copied))
        } else {
            Ok(ReadOutcome::complete(copied))
        }
    }

    async fn size(&self) -> Result<u64> {
        self.inner.size().await
    }
}
