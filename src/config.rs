//! Reader construction.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backend::{BackendFactory, ObjectBackend};
use crate::error::{Error, Result};
use crate::io::{CachePolicy, CachedReader, RangeReader};
use crate::object::ObjectHandle;
use crate::region::ClientMode;

/// Configures a [`RangeReader`] or a [`CachedReader`].
///
/// Exactly one of [`client`](Self::client) and [`factory`](Self::factory)
/// must be set. A fixed client serves every request; a factory builds the
/// default client from its base options and can build clients for other
/// regions when a request is redirected.
pub struct ReaderBuilder {
    bucket: String,
    key: String,
    size: Option<i64>,
    client: Option<Arc<dyn ObjectBackend>>,
    factory: Option<Arc<dyn BackendFactory>>,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl ReaderBuilder {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            size: None,
            client: None,
            factory: None,
            timeout: None,
            cancel: None,
        }
    }

    /// Use a single fixed client. Region redirects are surfaced as errors.
    pub fn client(mut self, client: Arc<dyn ObjectBackend>) -> Self {
        self.client = Some(client);
        self
    }

    /// Build clients on demand, following region redirects.
    pub fn factory(mut self, factory: Arc<dyn BackendFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Size of the object, when already known. Skips the metadata request.
    pub fn size(mut self, size: i64) -> Self {
        self.size = Some(size);
        self
    }

    /// Upper bound on every backend call and body read.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abort in-flight requests once `token` is cancelled.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Result<RangeReader> {
        if self.bucket.is_empty() {
            return Err(Error::Configuration("bucket is required".to_string()));
        }
        if self.key.is_empty() {
            return Err(Error::Configuration("object key is required".to_string()));
        }

        let size = match self.size {
            Some(size) if size < 0 => {
                return Err(Error::Configuration(format!(
                    "provided size is invalid: {size}"
                )));
            }
            Some(size) => Some(size as u64),
            None => None,
        };

        if self.timeout == Some(Duration::ZERO) {
            return Err(Error::Configuration("timeout must be positive".to_string()));
        }

        let mode = match (self.client, self.factory) {
            (Some(client), None) => ClientMode::Fixed(client),
            (None, Some(factory)) => {
                let default = factory.base_client().map_err(|e| {
                    Error::Configuration(format!("cannot build storage client: {e}"))
                })?;
                ClientMode::Regional { default, factory }
            }
            (None, None) => {
                return Err(Error::Configuration(
                    "a storage client or a client factory is required".to_string(),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(Error::Configuration(
                    "a storage client and a client factory are mutually exclusive".to_string(),
                ));
            }
        };

        Ok(RangeReader::from_parts(
            ObjectHandle::new(self.bucket, self.key, size),
            mode,
            self.timeout,
            self.cancel,
        ))
    }

    /// Build a reader that keeps the last fetched range in memory.
    pub fn build_cached(self, policy: CachePolicy) -> Result<CachedReader> {
        Ok(CachedReader::new(self.build()?, policy))
    }
}
