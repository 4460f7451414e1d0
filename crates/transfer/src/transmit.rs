//! Writes an [`UploadPlan`] to a byte sink.
//!
//! Items are copied through a single [`CHUNK_SIZE`] buffer, strictly in
//! plan order, so memory use does not depend on item size.

use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::progress::{ProgressState, UploadObserver};
use crate::types::{PartSource, UploadPlan};
use crate::{CHUNK_SIZE, TransferError, UploadItem};

/// Outcome of a completed [`transmit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitReport {
    /// Item bytes read from sources (excludes multipart framing and fields).
    pub bytes_sent: u64,
    /// Everything written to the sink.
    pub body_bytes: u64,
    pub elapsed: Duration,
}

/// Streams every part of `plan` into `writer`.
///
/// Item sources are opened right before their part and dropped right after
/// it, including when reading or writing fails.
pub async fn transmit<W>(
    writer: &mut W,
    plan: &UploadPlan<'_>,
    observer: Option<&dyn UploadObserver>,
) -> Result<TransmitReport, TransferError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let started = Instant::now();
    let item_count = plan.item_count();
    let total_data_bytes = plan.total_data_bytes();

    info!(
        items = item_count,
        total_data_bytes,
        framing = ?plan.framing(),
        "sending multipart body"
    );
    if let Some(obs) = observer {
        obs.upload_start(item_count, total_data_bytes);
    }

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut bytes_sent: u64 = 0;
    let mut body_bytes: u64 = 0;

    for part in plan.parts() {
        write_sink(writer, &part.header).await?;
        body_bytes += part.header.len() as u64;

        match part.source {
            PartSource::Item(item) => {
                let n = send_item(writer, item, &mut buf, observer).await?;
                bytes_sent += n;
                body_bytes += n;
                write_sink(writer, &part.footer).await?;
                writer.flush().await.map_err(TransferError::Sink)?;
            }
            PartSource::Field(field) => {
                write_sink(writer, field.value.as_bytes()).await?;
                write_sink(writer, &part.footer).await?;
                body_bytes += field.value.len() as u64;
            }
            PartSource::Closing => {
                write_sink(writer, &part.footer).await?;
            }
        }
        body_bytes += part.footer.len() as u64;
    }
    writer.flush().await.map_err(TransferError::Sink)?;

    let elapsed = started.elapsed();
    if let Some(obs) = observer {
        obs.upload_end(bytes_sent, elapsed);
    }
    info!(bytes_sent, body_bytes, elapsed_ms = elapsed.as_millis() as u64, "multipart body sent");

    Ok(TransmitReport {
        bytes_sent,
        body_bytes,
        elapsed,
    })
}

/// Copies one item into the sink, reporting progress after every chunk.
async fn send_item<W>(
    writer: &mut W,
    item: &UploadItem,
    buf: &mut [u8],
    observer: Option<&dyn UploadObserver>,
) -> Result<u64, TransferError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut reader = item.open().await?;
    let mut progress = ProgressState::new(item.size());
    report(observer, item, progress.start());

    loop {
        let n = fill_chunk(&mut reader, buf)
            .await
            .map_err(|source| TransferError::ItemRead {
                item: item.label(),
                source,
            })?;
        if n == 0 {
            break;
        }

        // Known sizes were declared in Content-Length; never exceed them.
        if let Some(expected) = item.size()
            && progress.bytes_written() + n as u64 > expected
        {
            return Err(TransferError::SizeMismatch {
                item: item.label(),
                expected,
                actual: progress.bytes_written() + n as u64,
            });
        }

        write_sink(writer, &buf[..n]).await?;
        report(observer, item, progress.advance(n as u64));

        if n < buf.len() {
            break;
        }
    }

    let written = progress.bytes_written();
    if let Some(expected) = item.size()
        && written != expected
    {
        return Err(TransferError::SizeMismatch {
            item: item.label(),
            expected,
            actual: written,
        });
    }

    report(observer, item, progress.finish());
    debug!(item = %item.label(), bytes = written, "item sent");
    Ok(written)
}

/// Reads until `buf` is full or the source is exhausted.
async fn fill_chunk<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn write_sink<W>(writer: &mut W, bytes: &[u8]) -> Result<(), TransferError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    if bytes.is_empty() {
        return Ok(());
    }
    writer.write_all(bytes).await.map_err(TransferError::Sink)
}

fn report(observer: Option<&dyn UploadObserver>, item: &UploadItem, percent: Option<u8>) {
    if let (Some(obs), Some(pct)) = (observer, percent) {
        obs.upload_progress(item, item.size(), pct);
    }
}
