use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

const UNKNOWN_SIZE: i64 = -1;

/// Identifies one remote object and caches its size.
///
/// The size is resolved at most once per handle and never changes
/// afterwards: the object is assumed not to be rewritten while it is read.
#[derive(Debug)]
pub struct ObjectHandle {
    bucket: String,
    key: String,
    size: AtomicI64,
}

impl ObjectHandle {
    /// Create a handle. `size` is a length known up front, which saves the
    /// metadata request.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, size: Option<u64>) -> Self {
        let size = size
            .and_then(|s| i64::try_from(s).ok())
            .unwrap_or(UNKNOWN_SIZE);
        Self {
            bucket: bucket.into(),
            key: key.into(),
            size: AtomicI64::new(size),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The object size, if it is already known.
    pub fn cached_size(&self) -> Option<u64> {
        let size = self.size.load(Ordering::Acquire);
        u64::try_from(size).ok()
    }

    /// Record a resolved size. Concurrent resolutions of the same object
    /// store the same value, so the last writer wins.
    pub(crate) fn record_size(&self, size: u64) {
        if let Ok(size) = i64::try_from(size) {
            self.size.store(size, Ordering::Release);
        }
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}
