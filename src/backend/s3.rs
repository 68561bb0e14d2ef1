use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::Client;

use super::{BackendError, BackendFactory, FailedRequest, ObjectBackend, ObjectMetadata, RangeBody};
use crate::io::ByteRange;

/// Amazon S3 (or an S3-compatible service) reached through the AWS SDK.
pub struct S3Backend {
    client: Client,
}

impl S3Backend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Region the underlying client signs requests for.
    pub fn region(&self) -> Option<&str> {
        self.client.config().region().map(|r| r.as_ref())
    }
}

/// Keep the raw response of a service error so region recovery can look at
/// its status and headers.
fn backend_error<E>(err: SdkError<E, HttpResponse>) -> BackendError
where
    E: std::error::Error + Send + Sync + 'static,
{
    match err.raw_response() {
        Some(raw) => {
            let mut failed = FailedRequest::new(
                raw.status().as_u16(),
                DisplayErrorContext(&err).to_string(),
            );
            for (name, value) in raw.headers().iter() {
                failed = failed.with_header(name, value);
            }
            BackendError::Response(failed)
        }
        None => BackendError::transport(err),
    }
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, BackendError> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(backend_error)?;

        Ok(ObjectMetadata {
            content_length: output.content_length(),
        })
    }

    async fn get_range(
        &self,
        bucket: &str,
        key: &str,
        range: ByteRange,
    ) -> Result<RangeBody, BackendError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(range.to_header())
            .send()
            .await
            .map_err(backend_error)?;

        let declared = output.content_length().and_then(|n| u64::try_from(n).ok());
        Ok(RangeBody::new(
            declared,
            Box::pin(output.body.into_async_read()),
        ))
    }
}

/// Builds [`S3Backend`]s from one base SDK configuration.
pub struct S3BackendFactory {
    base: aws_sdk_s3::Config,
}

impl S3BackendFactory {
    pub fn new(base: aws_sdk_s3::Config) -> Self {
        Self { base }
    }

    /// Load credentials and region from the environment, the shared config
    /// files or the instance metadata service.
    ///
    /// A custom `endpoint` switches to path-style addressing, which is what
    /// most S3-compatible services expect.
    pub async fn from_env(region: Option<&str>, endpoint: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self::new(builder.build())
    }

    fn regional_config(&self, region: &str) -> aws_sdk_s3::Config {
        self.base
            .to_builder()
            .region(Region::new(region.to_string()))
            .build()
    }
}

impl BackendFactory for S3BackendFactory {
    fn base_client(&self) -> Result<Arc<dyn ObjectBackend>, BackendError> {
        let client = Client::from_conf(self.base.clone());
        Ok(Arc::new(S3Backend::new(client)))
    }

    fn for_region(&self, region: &str) -> Result<Arc<dyn ObjectBackend>, BackendError> {
        if region.is_empty() {
            return Err(BackendError::Options("empty region".to_string()));
        }
        let client = Client::from_conf(self.regional_config(region));
        Ok(Arc::new(S3Backend::new(client)))
    }
}
