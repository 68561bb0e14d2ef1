//! Recovery from requests sent to the wrong storage region.
//!
//! S3 answers a request for a bucket living in another region with a 3xx
//! status and an `x-amz-bucket-region` header. When the reader was built
//! with a [`BackendFactory`], the request is replayed once against a client
//! bound to that region, and the client is kept for later requests.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::backend::{BackendError, BackendFactory, FailedRequest, ObjectBackend};

/// Header carrying the region a bucket lives in.
pub const REGION_HEADER: &str = "x-amz-bucket-region";

/// Outcome of inspecting a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionRecovery {
    /// The object lives in this region.
    Recoverable(String),
    Unrecoverable,
}

/// Decide whether `failed` is a region redirect.
pub fn classify(failed: &FailedRequest) -> RegionRecovery {
    if !failed.is_redirect() {
        return RegionRecovery::Unrecoverable;
    }
    match failed.header(REGION_HEADER) {
        Some(region) if !region.trim().is_empty() => {
            RegionRecovery::Recoverable(region.trim().to_string())
        }
        _ => RegionRecovery::Unrecoverable,
    }
}

/// How the reader obtains its storage clients.
#[derive(Clone)]
pub enum ClientMode {
    /// A single client supplied by the caller; no region recovery.
    Fixed(Arc<dyn ObjectBackend>),
    /// Clients built on demand from shared base options.
    Regional {
        default: Arc<dyn ObjectBackend>,
        factory: Arc<dyn BackendFactory>,
    },
}

/// The one non-default client a reader may hold.
struct RegionBinding {
    region: String,
    client: Arc<dyn ObjectBackend>,
}

/// Runs backend operations, replaying them once in the right region.
pub struct RegionResolver {
    mode: ClientMode,
    binding: Mutex<Option<RegionBinding>>,
}

impl RegionResolver {
    pub fn new(mode: ClientMode) -> Self {
        Self {
            mode,
            binding: Mutex::new(None),
        }
    }

    /// Region of the cached region-bound client, if any.
    pub fn bound_region(&self) -> Option<String> {
        self.lock().as_ref().map(|b| b.region.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<RegionBinding>> {
        self.binding.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The client the next operation starts with.
    fn active_client(&self) -> Arc<dyn ObjectBackend> {
        match &self.mode {
            ClientMode::Fixed(client) => client.clone(),
            ClientMode::Regional { default, .. } => match self.lock().as_ref() {
                Some(binding) => binding.client.clone(),
                None => default.clone(),
            },
        }
    }

    /// Get the client bound to `region`, building and caching it if needed.
    fn bind(
        &self,
        factory: &dyn BackendFactory,
        region: &str,
    ) -> Result<Arc<dyn ObjectBackend>, BackendError> {
        let mut binding = self.lock();
        if let Some(existing) = binding.as_ref() {
            if existing.region == region {
                return Ok(existing.client.clone());
            }
        }

        let client = factory.for_region(region)?;
        debug!(region, "bound reader to region");
        *binding = Some(RegionBinding {
            region: region.to_string(),
            client: client.clone(),
        });
        Ok(client)
    }

    /// Run `op` against the active client. If it fails with a region
    /// redirect and a factory is available, run it once more against the
    /// client for the advertised region. Any other failure, and any failure
    /// of the replay, is returned as is.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, BackendError>
    where
        F: Fn(Arc<dyn ObjectBackend>) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let err = match op(self.active_client()).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let ClientMode::Regional { factory, .. } = &self.mode else {
            return Err(err);
        };
        let region = match err.response().map(classify) {
            Some(RegionRecovery::Recoverable(region)) => region,
            _ => return Err(err),
        };

        let client = match self.bind(factory.as_ref(), &region) {
            Ok(client) => client,
            Err(bind_err) => {
                warn!(region = %region, error = %bind_err, "cannot build region-bound client");
                return Err(err);
            }
        };

        debug!(region = %region, "retrying request in advertised region");
        op(client).await
    }
}
