use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, RANGE};
use reqwest::{Client, Response, StatusCode};
use tokio_util::io::StreamReader;

use super::{BackendError, BackendFactory, FailedRequest, ObjectBackend, ObjectMetadata, RangeBody};
use crate::io::ByteRange;

/// Placeholder substituted by the regional endpoint.
const REGION_PLACEHOLDER: &str = "{region}";

/// Connection options shared by every [`HttpBackend`] built by a factory.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Base endpoint, e.g. `https://s3.amazonaws.com`.
    pub endpoint: String,
    /// Endpoint used once a region is known, e.g.
    /// `https://s3.{region}.amazonaws.com`. Without a template the reader
    /// cannot follow region redirects.
    pub endpoint_template: Option<String>,
    pub timeout: Duration,
}

impl HttpOptions {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            endpoint_template: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_endpoint_template(mut self, template: impl Into<String>) -> Self {
        self.endpoint_template = Some(template.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Path-style S3-compatible endpoint accessed with plain HTTP requests.
///
/// Objects are addressed as `{endpoint}/{bucket}/{key}` and requests are
/// anonymous, which suits public buckets and pre-authorized gateways.
pub struct HttpBackend {
    client: Client,
    endpoint: String,
}

impl HttpBackend {
    /// Create a backend for `endpoint`.
    ///
    /// Redirects are not followed: a 3xx response is handed back to the
    /// reader, which decides whether it is a region redirect.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(BackendError::transport)?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, bucket, key.trim_start_matches('/'))
    }
}

fn failed_request(status: StatusCode, headers: &HeaderMap) -> FailedRequest {
    let mut failed = FailedRequest::new(
        status.as_u16(),
        status.canonical_reason().unwrap_or_default(),
    );
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            failed = failed.with_header(name.as_str(), value);
        }
    }
    failed
}

fn content_length(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
}

fn check_status(resp: &Response, expected: &[StatusCode]) -> Result<(), BackendError> {
    if expected.contains(&resp.status()) {
        Ok(())
    } else {
        Err(BackendError::Response(failed_request(
            resp.status(),
            resp.headers(),
        )))
    }
}

#[async_trait]
impl ObjectBackend for HttpBackend {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, BackendError> {
        let resp = self
            .client
            .head(self.object_url(bucket, key))
            .send()
            .await
            .map_err(BackendError::transport)?;
        check_status(&resp, &[StatusCode::OK])?;

        Ok(ObjectMetadata {
            content_length: content_length(resp.headers()),
        })
    }

    async fn get_range(
        &self,
        bucket: &str,
        key: &str,
        range: ByteRange,
    ) -> Result<RangeBody, BackendError> {
        let resp = self
            .client
            .get(self.object_url(bucket, key))
            .header(RANGE, range.to_header())
            .send()
            .await
            .map_err(BackendError::transport)?;

        // A full-body answer is only usable when the range starts at zero.
        if range.first() == 0 {
            check_status(&resp, &[StatusCode::PARTIAL_CONTENT, StatusCode::OK])?;
        } else {
            check_status(&resp, &[StatusCode::PARTIAL_CONTENT])?;
        }

        let declared = content_length(resp.headers()).and_then(|n| u64::try_from(n).ok());
        let stream = resp
            .bytes_stream()
            .map_err(std::io::Error::other);

        Ok(RangeBody::new(declared, Box::pin(StreamReader::new(stream))))
    }
}

/// Builds [`HttpBackend`]s from shared [`HttpOptions`].
pub struct HttpBackendFactory {
    options: HttpOptions,
}

impl HttpBackendFactory {
    pub fn new(options: HttpOptions) -> Self {
        Self { options }
    }
}

impl BackendFactory for HttpBackendFactory {
    fn base_client(&self) -> Result<Arc<dyn ObjectBackend>, BackendError> {
        let backend = HttpBackend::new(&self.options.endpoint, self.options.timeout)?;
        Ok(Arc::new(backend))
    }

    fn for_region(&self, region: &str) -> Result<Arc<dyn ObjectBackend>, BackendError> {
        let template = self.options.endpoint_template.as_deref().ok_or_else(|| {
            BackendError::Options(format!(
                "no endpoint template to reach region {region} from {}",
                self.options.endpoint
            ))
        })?;
        if !template.contains(REGION_PLACEHOLDER) {
            return Err(BackendError::Options(format!(
                "endpoint template {template} has no {REGION_PLACEHOLDER} placeholder"
            )));
        }

        let endpoint = template.replace(REGION_PLACEHOLDER, region);
        let backend = HttpBackend::new(endpoint, self.options.timeout)?;
        Ok(Arc::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tokio::io::AsyncReadExt;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::Error;
    use crate::io::{RangeReader, ReadAt, ReadOutcome};

    #[tokio::test]
    async fn test_head_object() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/bucket/data.parquet"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 128]))
            .mount(&mock_server)
            .await;

        let backend = HttpBackend::new(mock_server.uri(), Duration::from_secs(5))?;
        let meta = backend.head_object("bucket", "data.parquet").await?;

        assert_eq!(meta.content_length, Some(128));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_range_sends_range_header() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bucket/data.parquet"))
            .and(header("range", "bytes=4-8"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(b"quick".to_vec()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let backend = HttpBackend::new(mock_server.uri(), Duration::from_secs(5))?;
        let mut body = backend
            .get_range("bucket", "data.parquet", ByteRange::new(4, 8).unwrap())
            .await?;

        let mut out = Vec::new();
        body.stream.read_to_end(&mut out).await?;
        assert_eq!(out, b"quick");
        assert_eq!(body.content_length, Some(5));
        Ok(())
    }

    #[tokio::test]
    async fn test_redirect_is_not_followed() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/bucket/key"))
            .respond_with(
                ResponseTemplate::new(301)
                    .insert_header("x-amz-bucket-region", "eu-west-1")
                    .insert_header("location", "https://example.invalid/"),
            )
            .mount(&mock_server)
            .await;

        let backend = HttpBackend::new(mock_server.uri(), Duration::from_secs(5))?;
        let err = backend.head_object("bucket", "key").await.unwrap_err();

        let failed = err.response().expect("response should be kept");
        assert_eq!(failed.status, 301);
        assert_eq!(failed.header("x-amz-bucket-region"), Some("eu-west-1"));
        Ok(())
    }

    #[tokio::test]
    async fn test_full_body_rejected_for_inner_range() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bucket/key"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"everything".to_vec()))
            .mount(&mock_server)
            .await;

        let backend = HttpBackend::new(mock_server.uri(), Duration::from_secs(5))?;
        let err = backend
            .get_range("bucket", "key", ByteRange::new(3, 5).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.response().map(|r| r.status), Some(200));
        Ok(())
    }

    #[test]
    fn test_factory_requires_region_template() {
        let factory = HttpBackendFactory::new(HttpOptions::new("http://localhost:9000"));
        assert!(factory.base_client().is_ok());
        assert!(matches!(
            factory.for_region("eu-west-1"),
            Err(BackendError::Options(_))
        ));

        let factory = HttpBackendFactory::new(
            HttpOptions::new("http://localhost:9000")
                .with_endpoint_template("http://localhost:9000"),
        );
        assert!(factory.for_region("eu-west-1").is_err());
    }

    async fn slow_object_server(delay: Duration) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bucket/key"))
            .respond_with(
                ResponseTemplate::new(206)
                    .set_body_bytes(b"01234567".to_vec())
                    .set_delay(delay),
            )
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_cancel_aborts_request_in_flight() -> Result<()> {
        let mock_server = slow_object_server(Duration::from_secs(3)).await;
        let token = CancellationToken::new();
        let reader = RangeReader::builder("bucket", "key")
            .client(Arc::new(HttpBackend::new(mock_server.uri(), Duration::from_secs(10))?))
            .size(64)
            .cancellation(token.clone())
            .build()?;

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });

        let mut buf = [0u8; 8];
        let started = std::time::Instant::now();
        let result = reader.read_at(0, &mut buf).await;
        canceller.await?;

        assert!(matches!(result, Err(Error::Cancelled)), "{result:?}");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(reader.transferred_bytes(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_deadline_exceeded_in_flight() -> Result<()> {
        let mock_server = slow_object_server(Duration::from_secs(3)).await;
        let reader = RangeReader::builder("bucket", "key")
            .client(Arc::new(HttpBackend::new(mock_server.uri(), Duration::from_secs(10))?))
            .size(64)
            .timeout(Duration::from_millis(200))
            .build()?;

        let mut buf = [0u8; 8];
        let started = std::time::Instant::now();
        let result = reader.read_at(0, &mut buf).await;

        assert!(matches!(result, Err(Error::DeadlineExceeded)), "{result:?}");
        assert!(!result.is_ok_and(|outcome| outcome.is_end_of_data()));
        assert!(started.elapsed() < Duration::from_secs(2));
        Ok(())
    }

    #[tokio::test]
    async fn test_region_redirect_follows_endpoint_template() -> Result<()> {
        let remote = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/bucket/key"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"0123456789".to_vec()))
            .expect(1)
            .mount(&remote)
            .await;
        Mock::given(method("GET"))
            .and(path("/bucket/key"))
            .and(header("range", "bytes=6-9"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(b"6789".to_vec()))
            .expect(1)
            .mount(&remote)
            .await;

        // The home server sends every request to the region named after the
        // remote server's host.
        let home = MockServer::start().await;
        Mock::given(path("/bucket/key"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("x-amz-bucket-region", "127.0.0.1"),
            )
            .expect(1)
            .mount(&home)
            .await;

        let template = format!("http://{{region}}:{}", remote.address().port());
        let factory = HttpBackendFactory::new(
            HttpOptions::new(home.uri()).with_endpoint_template(template),
        );
        let reader = RangeReader::builder("bucket", "key")
            .factory(Arc::new(factory))
            .build()?;

        let mut buf = [0u8; 8];
        let outcome = reader.read_at(6, &mut buf).await?;

        assert_eq!(outcome, ReadOutcome::end_of_data(4));
        assert_eq!(&buf[..4], b"6789");
        assert_eq!(reader.bound_region().as_deref(), Some("127.0.0.1"));
        Ok(())
    }
}
