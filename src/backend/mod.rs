//! Object storage collaborators.
//!
//! The readers never talk to a storage service directly. They go through
//! [`ObjectBackend`], which offers exactly two operations: a metadata
//! request returning the object length and a range request returning a
//! byte stream. Region-aware readers additionally get a [`BackendFactory`]
//! that can build a backend bound to another region.
//!
//! Failures are normalized into [`BackendError`], so region recovery only
//! needs to inspect a status code and a set of headers.

mod http;
pub mod memory;
mod s3;

pub use http::{HttpBackend, HttpBackendFactory, HttpOptions};
pub use memory::{InMemoryBackend, InMemoryFactory};
pub use s3::{S3Backend, S3BackendFactory};

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

use crate::io::ByteRange;

/// Metadata returned by a metadata request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Length reported by the backend, as reported. May be missing or
    /// negative; the size resolver validates it.
    pub content_length: Option<i64>,
}

/// Response body of a range request.
pub struct RangeBody {
    /// Length declared by the backend for this response, if any.
    pub content_length: Option<u64>,
    pub stream: Pin<Box<dyn AsyncRead + Send>>,
}

impl RangeBody {
    pub fn new(content_length: Option<u64>, stream: Pin<Box<dyn AsyncRead + Send>>) -> Self {
        Self {
            content_length,
            stream,
        }
    }
}

impl fmt::Debug for RangeBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// A storage client able to serve metadata and range requests.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Fetch the metadata of `bucket/key`.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, BackendError>;

    /// Fetch the bytes of `range` from `bucket/key`.
    async fn get_range(
        &self,
        bucket: &str,
        key: &str,
        range: ByteRange,
    ) -> Result<RangeBody, BackendError>;
}

/// Builds backends from a shared set of base connection options.
pub trait BackendFactory: Send + Sync {
    /// The backend bound to the base options' own region.
    fn base_client(&self) -> Result<Arc<dyn ObjectBackend>, BackendError>;

    /// A backend identical to the base one but bound to `region`.
    fn for_region(&self, region: &str) -> Result<Arc<dyn ObjectBackend>, BackendError>;
}

/// A request that reached the service and got an unsuccessful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRequest {
    pub status: u16,
    /// Response headers, keyed by lower-cased name.
    pub headers: HashMap<String, String>,
    pub message: String,
}

impl FailedRequest {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            message: message.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

impl fmt::Display for FailedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "status {}", self.status)
        } else {
            write!(f, "status {}: {}", self.status, self.message)
        }
    }
}

/// Failure of a backend call.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The service answered with an unsuccessful status.
    #[error("request failed with {0}")]
    Response(FailedRequest),

    /// The request never produced a response.
    #[error(transparent)]
    Transport(Box<dyn std::error::Error + Send + Sync>),

    /// A client could not be built from the given options.
    #[error("invalid client options: {0}")]
    Options(String),
}

impl BackendError {
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        BackendError::Transport(Box::new(err))
    }

    /// The failed response, when the request reached the service.
    pub fn response(&self) -> Option<&FailedRequest> {
        match self {
            BackendError::Response(failed) => Some(failed),
            _ => None,
        }
    }
}
