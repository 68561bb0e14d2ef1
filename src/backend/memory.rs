//! In-memory object store.
//!
//! Deterministic stand-in for a storage service: objects live in a map,
//! every request is counted, and failures can be injected.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::{BackendError, BackendFactory, FailedRequest, ObjectBackend, ObjectMetadata, RangeBody};
use crate::io::ByteRange;

#[derive(Default)]
struct State {
    objects: HashMap<(String, String), Vec<u8>>,
    failure: Option<FailedRequest>,
    reported_length: Option<Option<i64>>,
    body_limit: Option<usize>,
}

/// Object store backed by a `HashMap`.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
    head_requests: AtomicUsize,
    range_requests: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under `bucket/key`, replacing any previous object.
    pub fn put_object(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        self.state()
            .objects
            .insert((bucket.to_string(), key.to_string()), data.into());
    }

    /// Make every subsequent request fail with `failure`, or succeed again
    /// with `None`.
    pub fn set_failure(&self, failure: Option<FailedRequest>) {
        self.state().failure = failure;
    }

    /// Override the length reported by metadata requests. `None` reports
    /// no length at all.
    pub fn report_length(&self, length: Option<i64>) {
        self.state().reported_length = Some(length);
    }

    /// Cut every response body after `limit` bytes while still declaring
    /// the full length.
    pub fn truncate_bodies(&self, limit: usize) {
        self.state().body_limit = Some(limit);
    }

    pub fn head_requests(&self) -> usize {
        self.head_requests.load(Ordering::SeqCst)
    }

    pub fn range_requests(&self) -> usize {
        self.range_requests.load(Ordering::SeqCst)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn no_such_key(bucket: &str, key: &str) -> BackendError {
    BackendError::Response(FailedRequest::new(
        404,
        format!("NoSuchKey: {bucket}/{key}"),
    ))
}

#[async_trait]
impl ObjectBackend for InMemoryBackend {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, BackendError> {
        self.head_requests.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if let Some(failure) = &state.failure {
            return Err(BackendError::Response(failure.clone()));
        }
        let data = state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| no_such_key(bucket, key))?;
        let content_length = match state.reported_length {
            Some(length) => length,
            None => Some(data.len() as i64),
        };
        Ok(ObjectMetadata { content_length })
    }

    async fn get_range(
        &self,
        bucket: &str,
        key: &str,
        range: ByteRange,
    ) -> Result<RangeBody, BackendError> {
        self.range_requests.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if let Some(failure) = &state.failure {
            return Err(BackendError::Response(failure.clone()));
        }
        let data = state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| no_such_key(bucket, key))?;

        let size = data.len() as u64;
        if range.first() >= size {
            return Err(BackendError::Response(FailedRequest::new(
                416,
                format!("InvalidRange: {}", range.to_header()),
            )));
        }
        let last = range.last().min(size - 1);
        let mut body = data[range.first() as usize..=last as usize].to_vec();
        let declared = body.len() as u64;
        if let Some(limit) = state.body_limit {
            body.truncate(limit);
        }
        Ok(RangeBody::new(Some(declared), Box::pin(Cursor::new(body))))
    }
}

/// Factory handing out one [`InMemoryBackend`] per region.
pub struct InMemoryFactory {
    base: Arc<InMemoryBackend>,
    regions: HashMap<String, Arc<InMemoryBackend>>,
    built: AtomicUsize,
}

impl InMemoryFactory {
    pub fn new(base: Arc<InMemoryBackend>) -> Self {
        Self {
            base,
            regions: HashMap::new(),
            built: AtomicUsize::new(0),
        }
    }

    /// Register the backend served for `region`.
    pub fn with_region(mut self, region: &str, backend: Arc<InMemoryBackend>) -> Self {
        self.regions.insert(region.to_string(), backend);
        self
    }

    /// Number of region-bound clients built so far.
    pub fn regional_clients_built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }
}

impl BackendFactory for InMemoryFactory {
    fn base_client(&self) -> Result<Arc<dyn ObjectBackend>, BackendError> {
        Ok(self.base.clone())
    }

    fn for_region(&self, region: &str) -> Result<Arc<dyn ObjectBackend>, BackendError> {
        let backend = self
            .regions
            .get(region)
            .cloned()
            .ok_or_else(|| BackendError::Options(format!("unknown region {region}")))?;
        self.built.fetch_add(1, Ordering::SeqCst);
        Ok(backend)
    }
}
