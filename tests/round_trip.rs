use std::sync::Arc;

use anyhow::Result;
use s3readat::{
    CachePolicy, FailedRequest, InMemoryBackend, InMemoryFactory, RangeReader, ReadAt,
    ReadOutcome, ReadStatus, SeekableReader, Whence,
};

const BUCKET: &str = "warehouse";
const KEY: &str = "tables/events/part-0000.parquet";

fn sample(len: usize) -> Vec<u8> {
    // Not periodic over small windows, so misplaced bytes show up.
    let mut state = 0x2545_f491u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

fn store(data: &[u8]) -> Arc<InMemoryBackend> {
    let backend = Arc::new(InMemoryBackend::new());
    backend.put_object(BUCKET, KEY, data.to_vec());
    backend
}

async fn read_window<R: ReadAt>(
    reader: &R,
    offset: u64,
    len: usize,
) -> Result<(Vec<u8>, ReadOutcome)> {
    let mut buf = vec![0u8; len];
    let outcome = reader.read_at(offset, &mut buf).await?;
    buf.truncate(outcome.len);
    Ok((buf, outcome))
}

fn windows(size: usize) -> Vec<(u64, usize)> {
    vec![
        (0, size),
        (0, 1),
        (size as u64 - 1, 1),
        (1, size - 2),
        (17, 333),
        (size as u64 / 2, size / 4),
        (size as u64 - 10, 10),
    ]
}

#[tokio::test]
async fn test_windows_reproduce_object() -> Result<()> {
    let data = sample(4099);
    let reader = RangeReader::builder(BUCKET, KEY).client(store(&data)).build()?;

    for (offset, len) in windows(data.len()) {
        let (bytes, outcome) = read_window(&reader, offset, len).await?;
        let start = offset as usize;
        assert_eq!(outcome.status, ReadStatus::Complete, "window {offset}+{len}");
        assert_eq!(bytes, &data[start..start + len], "window {offset}+{len}");
    }
    Ok(())
}

#[tokio::test]
async fn test_windows_through_cache_match_direct_reads() -> Result<()> {
    let data = sample(4099);
    let backend = store(&data);
    let direct = RangeReader::builder(BUCKET, KEY).client(backend.clone()).build()?;
    let cached = RangeReader::builder(BUCKET, KEY)
        .client(backend.clone())
        .build_cached(CachePolicy::with_readahead(1024))?;

    for (offset, len) in windows(data.len()) {
        assert_eq!(
            read_window(&direct, offset, len).await?,
            read_window(&cached, offset, len).await?,
            "window {offset}+{len}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_tail_reads() -> Result<()> {
    let data = sample(1000);
    let backend = store(&data);
    let reader = RangeReader::builder(BUCKET, KEY).client(backend.clone()).build()?;

    let (bytes, outcome) = read_window(&reader, 990, 64).await?;
    assert_eq!(outcome, ReadOutcome::end_of_data(10));
    assert_eq!(bytes, &data[990..]);

    let requests = backend.range_requests();
    let (bytes, outcome) = read_window(&reader, 1000, 64).await?;
    assert!(bytes.is_empty());
    assert_eq!(outcome, ReadOutcome::end_of_data(0));
    assert_eq!(backend.range_requests(), requests);
    assert_eq!(backend.head_requests(), 1);
    Ok(())
}

#[tokio::test]
async fn test_sequential_scan_with_cursor() -> Result<()> {
    let data = sample(10_000);
    let reader = RangeReader::builder(BUCKET, KEY)
        .client(store(&data))
        .build_cached(CachePolicy::with_readahead(4096))?;
    let mut cursor = SeekableReader::new(reader);

    let mut out = Vec::new();
    let mut buf = vec![0u8; 700];
    loop {
        let outcome = cursor.read(&mut buf).await?;
        out.extend_from_slice(&buf[..outcome.len]);
        if outcome.is_end_of_data() {
            break;
        }
    }

    assert_eq!(out, data);
    assert_eq!(cursor.position(), data.len() as u64);
    assert_eq!(cursor.get_ref().inner().range_requests(), 3);
    Ok(())
}

#[tokio::test]
async fn test_footer_read_after_region_redirect() -> Result<()> {
    let data = sample(2048);
    let home = store(&data);
    home.set_failure(Some(
        FailedRequest::new(301, "PermanentRedirect")
            .with_header("x-amz-bucket-region", "ap-southeast-2"),
    ));
    let remote = store(&data);
    let factory = InMemoryFactory::new(home.clone()).with_region("ap-southeast-2", remote.clone());

    let reader = RangeReader::builder(BUCKET, KEY)
        .factory(Arc::new(factory))
        .build()?;
    let mut cursor = SeekableReader::new(reader);

    assert_eq!(cursor.seek(0, Whence::Start).await?, 0);
    assert_eq!(cursor.seek(-8, Whence::End).await?, 2040);
    let mut footer = [0u8; 8];
    assert_eq!(cursor.read(&mut footer).await?, ReadOutcome::complete(8));
    assert_eq!(&footer, &data[2040..]);
    assert_eq!(cursor.read(&mut footer).await?, ReadOutcome::end_of_data(0));

    assert_eq!(home.head_requests(), 1);
    assert_eq!(remote.range_requests(), 1);
    Ok(())
}

#[tokio::test]
async fn test_shared_reader_across_tasks() -> Result<()> {
    let data = Arc::new(sample(64 * 1024));
    let backend = store(&data);
    let reader = Arc::new(RangeReader::builder(BUCKET, KEY).client(backend.clone()).build()?);

    let mut tasks = Vec::new();
    for i in 0..16u64 {
        let reader = reader.clone();
        let data = data.clone();
        tasks.push(tokio::spawn(async move {
            let offset = i * 4000;
            let mut buf = vec![0u8; 4096];
            let outcome = reader.read_at(offset, &mut buf).await?;
            let start = offset as usize;
            assert_eq!(&buf[..outcome.len], &data[start..start + outcome.len]);
            anyhow::Ok(outcome.len)
        }));
    }

    let mut total = 0;
    for task in tasks {
        total += task.await??;
    }
    assert_eq!(total, 16 * 4096);
    // Racing size resolutions are allowed; every one reports the same size.
    assert!(backend.head_requests() >= 1);
    assert_eq!(reader.size().await?, 64 * 1024);
    Ok(())
}
