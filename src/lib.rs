//! # s3readat
//!
//! Random-access reads of a single remote object using HTTP Range requests.
//!
//! A large object in an object store (a Parquet file, a ZIP archive, a
//! columnar index) can be consumed without downloading it in full: every
//! positional read becomes one `Range: bytes=first-last` request, clamped to
//! the end of the object.
//!
//! ## Features
//!
//! - Positional reads through the [`ReadAt`] trait, with end-of-data
//!   reported as a status rather than an error
//! - Object size resolved with at most one metadata request, or supplied
//!   up front
//! - Transparent retry in the right region when S3 answers with a region
//!   redirect
//! - Optional in-memory cache of the last fetched range, with readahead
//! - Seekable sequential reads on top of any [`ReadAt`]
//! - S3 through the AWS SDK, path-style HTTP endpoints through `reqwest`,
//!   and an in-memory backend for tests
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use s3readat::{ReadAt, RangeReader, S3BackendFactory, SeekableReader, Whence};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let factory = S3BackendFactory::from_env(None, None).await;
//!     let reader = RangeReader::builder("my-bucket", "data/table.parquet")
//!         .factory(Arc::new(factory))
//!         .build()?;
//!
//!     // Parquet footer length and magic.
//!     let size = reader.size().await?;
//!     let mut footer = [0u8; 8];
//!     reader.read_at(size - 8, &mut footer).await?;
//!
//!     // The same through a cursor.
//!     let mut cursor = SeekableReader::new(reader);
//!     cursor.seek(-8, Whence::End).await?;
//!     let outcome = cursor.read(&mut footer).await?;
//!     assert_eq!(outcome.len, 8);
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod object;
pub mod region;

pub use backend::{
    BackendError, BackendFactory, FailedRequest, HttpBackend, HttpBackendFactory, HttpOptions,
    InMemoryBackend, InMemoryFactory, ObjectBackend, S3Backend, S3BackendFactory,
};
pub use cli::{Cli, ObjectLocation};
pub use config::ReaderBuilder;
pub use error::{Error, Result};
pub use io::{
    ByteRange, CachePolicy, CachedReader, RangeReader, ReadAt, ReadOutcome, ReadStatus,
    SeekableReader, Whence,
};
pub use object::ObjectHandle;
pub use region::{ClientMode, RegionRecovery};
