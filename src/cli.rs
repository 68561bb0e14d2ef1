use std::time::Duration;

use clap::Parser;

use crate::error::{Error, Result};
use crate::io::Whence;

/// Endpoint template used for amazonaws.com endpoints once a region is known.
const AWS_ENDPOINT_TEMPLATE: &str = "https://s3.{region}.amazonaws.com";

#[derive(Parser, Debug)]
#[command(name = "seek-s3")]
#[command(version)]
#[command(about = "Print part of a remote object using HTTP Range requests", long_about = None)]
#[command(after_help = "Examples:\n  \
  seek-s3 s3://bucket/data.parquet                         print the last 8 bytes\n  \
  seek-s3 --offset 0 --whence 0 --limit 4 s3://bucket/key  print the first 4 bytes\n  \
  seek-s3 http://localhost:9000/bucket/key                 read from a path-style endpoint")]
pub struct Cli {
    /// Object URL: s3://BUCKET/KEY or http(s)://ENDPOINT/BUCKET/KEY
    #[arg(value_name = "URL")]
    pub url: String,

    /// Offset parameter to seek
    #[arg(long, default_value_t = -8, allow_negative_numbers = true)]
    pub offset: i64,

    /// Whence parameter to seek (0 is start, 1 is current and 2 is end)
    #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
    pub whence: i64,

    /// Limit the bytes to print (-1 is unlimited)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub limit: i64,

    /// Object size in bytes, skips the metadata request
    #[arg(long, allow_negative_numbers = true)]
    pub size: Option<i64>,

    /// Region of the S3 client (default: from the AWS environment)
    #[arg(long)]
    pub region: Option<String>,

    /// Custom S3 endpoint, addressed path-style
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Regional endpoint for http(s) URLs, with a {region} placeholder
    #[arg(long, value_name = "TEMPLATE")]
    pub endpoint_template: Option<String>,

    /// Use a single client and do not follow region redirects
    #[arg(long)]
    pub fixed_region: bool,

    /// Keep the last fetched range in memory, fetching at least BYTES per request
    #[arg(long, value_name = "BYTES", default_value_t = 0)]
    pub readahead: usize,

    /// Deadline in seconds for each request and body read
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Bytes requested per read
    #[arg(long, value_name = "BYTES", default_value_t = 64 * 1024)]
    pub chunk_size: usize,

    /// Enable verbose output
    #[arg(long)]
    pub debug: bool,
}

/// Where the object lives, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectLocation {
    S3 {
        bucket: String,
        key: String,
    },
    Http {
        endpoint: String,
        bucket: String,
        key: String,
    },
}

impl ObjectLocation {
    pub fn parse(url: &str) -> Result<Self> {
        let invalid =
            |reason: &str| Error::InvalidArgument(format!("invalid object URL {url:?}: {reason}"));

        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| invalid("expected s3://, http:// or https://"))?;

        match scheme {
            "s3" => {
                let (bucket, key) =
                    split_bucket_key(rest).ok_or_else(|| invalid("expected s3://BUCKET/KEY"))?;
                Ok(ObjectLocation::S3 { bucket, key })
            }
            "http" | "https" => {
                let (host, path) = rest
                    .split_once('/')
                    .filter(|(host, _)| !host.is_empty())
                    .ok_or_else(|| invalid("expected an endpoint followed by /BUCKET/KEY"))?;
                let (bucket, key) = split_bucket_key(path)
                    .ok_or_else(|| invalid("expected /BUCKET/KEY after the endpoint"))?;
                Ok(ObjectLocation::Http {
                    endpoint: format!("{scheme}://{host}"),
                    bucket,
                    key,
                })
            }
            _ => Err(invalid("unsupported scheme")),
        }
    }

    pub fn bucket(&self) -> &str {
        match self {
            ObjectLocation::S3 { bucket, .. } | ObjectLocation::Http { bucket, .. } => bucket,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            ObjectLocation::S3 { key, .. } | ObjectLocation::Http { key, .. } => key,
        }
    }
}

fn split_bucket_key(path: &str) -> Option<(String, String)> {
    let (bucket, key) = path.trim_start_matches('/').split_once('/')?;
    let key = key.trim_start_matches('/');
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket.to_string(), key.to_string()))
}

impl Cli {
    pub fn location(&self) -> Result<ObjectLocation> {
        ObjectLocation::parse(&self.url)
    }

    pub fn seek_whence(&self) -> Result<Whence> {
        Whence::try_from(self.whence)
    }

    /// The byte limit, `None` meaning unlimited.
    pub fn byte_limit(&self) -> Result<Option<u64>> {
        match self.limit {
            -1 => Ok(None),
            n if n > 0 => Ok(Some(n as u64)),
            n => Err(Error::InvalidArgument(format!(
                "limit must be -1 or positive, got {n}"
            ))),
        }
    }

    pub fn read_size(&self) -> Result<usize> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidArgument("chunk size must be positive".to_string()));
        }
        Ok(self.chunk_size)
    }

    /// Per-request deadline, if one was given.
    pub fn request_timeout(&self) -> Result<Option<Duration>> {
        match self.timeout {
            Some(0) => Err(Error::InvalidArgument("timeout must be positive".to_string())),
            secs => Ok(secs.map(Duration::from_secs)),
        }
    }

    /// Regional endpoint template for an http(s) endpoint: the one given
    /// on the command line, or the AWS one for amazonaws.com hosts.
    pub fn regional_template(&self, endpoint: &str) -> Option<String> {
        if let Some(template) = &self.endpoint_template {
            return Some(template.clone());
        }
        let host = endpoint.split_once("://").map_or(endpoint, |(_, host)| host);
        (host.starts_with("s3.") && host.ends_with(".amazonaws.com"))
            .then(|| AWS_ENDPOINT_TEMPLATE.to_string())
    }
}
