//! Main entry point for the seek-s3 CLI application.
//!
//! Seeks into a remote object and copies bytes from there to standard
//! output, fetching only the requested range.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use s3readat::{
    BackendFactory, CachePolicy, CachedReader, Cli, HttpBackendFactory, HttpOptions,
    ObjectLocation, ReadAt, ReaderBuilder, S3BackendFactory, SeekableReader, Whence,
};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    // Both the AWS SDK and reqwest pull in rustls; pick one provider.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let location = cli.location()?;
    let whence = cli.seek_whence()?;
    let limit = cli.byte_limit()?;
    let chunk_size = cli.read_size()?;
    let timeout = cli.request_timeout()?;

    let reader = reader_builder(&cli, &location, timeout)
        .await?
        .cancellation(interrupt_token())
        .build()
        .context("Unable to create reader")?;

    if cli.readahead > 0 {
        let reader = CachedReader::new(reader, CachePolicy::with_readahead(cli.readahead));
        let mut cursor = SeekableReader::new(reader);
        let written = copy_to_stdout(&mut cursor, &cli, whence, limit, chunk_size).await?;
        report_transfer(&cli, written, cursor.get_ref().inner().transferred_bytes());
    } else {
        let mut cursor = SeekableReader::new(reader);
        let written = copy_to_stdout(&mut cursor, &cli, whence, limit, chunk_size).await?;
        report_transfer(&cli, written, cursor.get_ref().transferred_bytes());
    }

    Ok(())
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("s3readat=debug,seek_s3=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // stdout carries the object bytes.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Token cancelled on Ctrl-C, aborting any request in flight.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupted");
            on_signal.cancel();
        }
    });
    token
}

/// Configure a reader for `location` from the command-line options.
async fn reader_builder(
    cli: &Cli,
    location: &ObjectLocation,
    timeout: Option<Duration>,
) -> Result<ReaderBuilder> {
    let factory: Arc<dyn BackendFactory> = match location {
        ObjectLocation::S3 { .. } => Arc::new(
            S3BackendFactory::from_env(cli.region.as_deref(), cli.endpoint.as_deref()).await,
        ),
        ObjectLocation::Http { endpoint, .. } => {
            let mut options = HttpOptions::new(endpoint.as_str());
            if let Some(template) = cli.regional_template(endpoint) {
                options = options.with_endpoint_template(template);
            }
            if let Some(timeout) = timeout {
                options = options.with_timeout(timeout);
            }
            Arc::new(HttpBackendFactory::new(options))
        }
    };

    let mut builder = ReaderBuilder::new(location.bucket(), location.key());
    builder = if cli.fixed_region {
        let client = factory
            .base_client()
            .context("Unable to create storage client")?;
        builder.client(client)
    } else {
        builder.factory(factory)
    };
    if let Some(size) = cli.size {
        builder = builder.size(size);
    }
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder)
}

/// Seek, then copy to stdout until end-of-data or the byte limit.
async fn copy_to_stdout<R: ReadAt>(
    cursor: &mut SeekableReader<R>,
    cli: &Cli,
    whence: Whence,
    limit: Option<u64>,
    chunk_size: usize,
) -> Result<u64> {
    let position = cursor
        .seek(cli.offset, whence)
        .await
        .context("Unable to seek object")?;
    debug!(position, ?limit, "copying to stdout");

    let mut stdout = tokio::io::stdout();
    let mut buf = vec![0u8; chunk_size];
    let mut remaining = limit;
    let mut written = 0u64;

    loop {
        let want = match remaining {
            Some(0) => break,
            Some(left) => left.min(buf.len() as u64) as usize,
            None => buf.len(),
        };

        let outcome = cursor
            .read(&mut buf[..want])
            .await
            .context("Failed to read object")?;
        stdout.write_all(&buf[..outcome.len]).await?;
        written += outcome.len as u64;
        if let Some(left) = remaining.as_mut() {
            *left -= outcome.len as u64;
        }

        if outcome.is_end_of_data() {
            break;
        }
    }

    stdout.flush().await?;
    Ok(written)
}

/// Display network transfer statistics in debug mode.
fn report_transfer(cli: &Cli, written: u64, transferred: u64) {
    if cli.debug {
        eprintln!("\nBytes written: {}", format_size(written));
        eprintln!("Total bytes transferred: {}", format_size(transferred));
    }
}

/// Format a byte size into a human-readable string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(1048576), "1.00 MB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
