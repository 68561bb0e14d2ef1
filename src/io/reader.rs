use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ByteRange, ReadAt, ReadOutcome};
use crate::config::ReaderBuilder;
use crate::error::{Error, Result};
use crate::object::ObjectHandle;
use crate::region::{ClientMode, RegionResolver};

/// Positional reader for a remote object, one range request per read.
///
/// The reader holds no per-read state, so it can be shared behind an `Arc`
/// and used from several tasks at once. Only the object size and the
/// region-bound client are cached, and both are set at most once.
pub struct RangeReader {
    handle: ObjectHandle,
    regions: RegionResolver,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
    range_requests: AtomicU64,
    transferred_bytes: AtomicU64,
}

impl RangeReader {
    /// Start configuring a reader for `bucket/key`.
    pub fn builder(bucket: impl Into<String>, key: impl Into<String>) -> ReaderBuilder {
        ReaderBuilder::new(bucket, key)
    }

    pub(crate) fn from_parts(
        handle: ObjectHandle,
        mode: ClientMode,
        timeout: Option<Duration>,
        cancel: Option<CancellationToken>,
    ) -> Self {
        Self {
            handle,
            regions: RegionResolver::new(mode),
            timeout,
            cancel,
            range_requests: AtomicU64::new(0),
            transferred_bytes: AtomicU64::new(0),
        }
    }

    pub fn handle(&self) -> &ObjectHandle {
        &self.handle
    }

    /// Region the reader was rebound to after a region redirect.
    pub fn bound_region(&self) -> Option<String> {
        self.regions.bound_region()
    }

    /// Get number of range requests issued
    pub fn range_requests(&self) -> u64 {
        self.range_requests.load(Ordering::Relaxed)
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Run `fut` unless the reader's cancellation token fires or its
    /// deadline passes first.
    async fn interruptible<F: Future>(&self, fut: F) -> Result<F::Output> {
        let bounded = async {
            match self.timeout {
                Some(timeout) => tokio::time::timeout(timeout, fut)
                    .await
                    .map_err(|_| Error::DeadlineExceeded),
                None => Ok(fut.await),
            }
        };

        match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::Cancelled),
                result = bounded => result,
            },
            None => bounded.await,
        }
    }

    async fn resolve_size(&self) -> Result<u64> {
        if let Some(size) = self.handle.cached_size() {
            return Ok(size);
        }

        debug!(object = %self.handle, "issuing metadata request");
        let (bucket, key) = (self.handle.bucket(), self.handle.key());
        let meta = self
            .interruptible(
                self.regions
                    .execute(|client| async move { client.head_object(bucket, key).await }),
            )
            .await?
            .map_err(|source| Error::Metadata {
                location: self.handle.to_string(),
                source,
            })?;

        let size = match meta.content_length {
            Some(len) => u64::try_from(len).map_err(|_| Error::InvalidMetadata {
                location: self.handle.to_string(),
                reason: format!("object size is invalid: {len}"),
            })?,
            None => {
                return Err(Error::InvalidMetadata {
                    location: self.handle.to_string(),
                    reason: "object size is missing".to_string(),
                });
            }
        };

        self.handle.record_size(size);
        debug!(object = %self.handle, size, "resolved object size");
        Ok(size)
    }

    /// Issue one range request for `range` and fill `buf`, which must be
    /// exactly `range.len()` bytes long.
    ///
    /// A body ending early is `EndOfData` when it matches the length the
    /// backend declared, and a transport error when it does not.
    pub(crate) async fn fetch(&self, range: ByteRange, buf: &mut [u8]) -> Result<ReadOutcome> {
        debug_assert_eq!(buf.len() as u64, range.len());

        debug!(object = %self.handle, range = %range.to_header(), "issuing range request");
        self.range_requests.fetch_add(1, Ordering::Relaxed);

        let (bucket, key) = (self.handle.bucket(), self.handle.key());
        let body = self
            .interruptible(
                self.regions
                    .execute(|client| async move { client.get_range(bucket, key, range).await }),
            )
            .await?
            .map_err(|source| Error::Fetch {
                location: self.handle.to_string(),
                range,
                source,
            })?;

        let declared = body.content_length;
        let filled = self
            .interruptible(read_full(body.stream, buf))
            .await?
            .map_err(|source| Error::Transport {
                location: self.handle.to_string(),
                range,
                source,
            })?;
        self.transferred_bytes
            .fetch_add(filled as u64, Ordering::Relaxed);

        if filled == buf.len() {
            return Ok(ReadOutcome::complete(filled));
        }
        match declared {
            Some(declared) if (filled as u64) < declared => Err(Error::Transport {
                location: self.handle.to_string(),
                range,
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("body ended after {filled} of {declared} declared bytes"),
                ),
            }),
            _ => {
                debug!(object = %self.handle, filled, "range response ended early");
                Ok(ReadOutcome::end_of_data(filled))
            }
        }
    }
}

/// Read from `stream` until `buf` is full or the stream ends.
async fn read_full(
    mut stream: Pin<Box<dyn AsyncRead + Send>>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[async_trait]
impl ReadAt for RangeReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<ReadOutcome> {
        let Some(requested) = ByteRange::from_offset(offset, buf.len() as u64) else {
            return Ok(ReadOutcome::complete(0));
        };

        let size = self.resolve_size().await?;
        let Some(range) = requested.clamp_to_size(size) else {
            debug!(object = %self.handle, offset, size, "read starts at or past the end");
            return Ok(ReadOutcome::end_of_data(0));
        };

        let outcome = self
            .fetch(range, &mut buf[..range.len() as usize])
            .await?;
        if range != requested {
            Ok(ReadOutcome::end_of_data(outcome.len))
        } else {
            Ok(outcome)
        }
    }

    async fn size(&self) -> Result<u64> {
        self.resolve_size().await
    }
}
