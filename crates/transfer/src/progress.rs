use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::{STREAM_NOTIONAL_SIZE, UploadItem};

/// Receives upload lifecycle callbacks.
///
/// Callbacks run inline on the uploading task, between chunk writes, so
/// they should return quickly.
pub trait UploadObserver: Send + Sync {
    /// Called once before the first body byte, with the summed size of all
    /// items whose size is known.
    fn upload_start(&self, item_count: usize, total_bytes: u64);

    /// Called with each new percentage for `item`. `total_size` is `None`
    /// for streams, whose percentages are measured against
    /// [`STREAM_NOTIONAL_SIZE`].
    fn upload_progress(&self, item: &UploadItem, total_size: Option<u64>, percent: u8);

    /// Called once after the closing boundary with the number of item bytes
    /// actually read.
    fn upload_end(&self, bytes_sent: u64, elapsed: Duration);
}

/// Owned form of the observer callbacks, for channel delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Started {
        item_count: usize,
        total_bytes: u64,
    },
    Progress {
        item: String,
        path: Option<PathBuf>,
        total_size: Option<u64>,
        percent: u8,
    },
    Finished {
        bytes_sent: u64,
        elapsed: Duration,
    },
}

/// Forwards events without blocking; events are dropped when the channel
/// is full or closed.
impl UploadObserver for mpsc::Sender<UploadEvent> {
    fn upload_start(&self, item_count: usize, total_bytes: u64) {
        let _ = self.try_send(UploadEvent::Started {
            item_count,
            total_bytes,
        });
    }

    fn upload_progress(&self, item: &UploadItem, total_size: Option<u64>, percent: u8) {
        let _ = self.try_send(UploadEvent::Progress {
            item: item.label(),
            path: item.path().map(PathBuf::from),
            total_size,
            percent,
        });
    }

    fn upload_end(&self, bytes_sent: u64, elapsed: Duration) {
        let _ = self.try_send(UploadEvent::Finished {
            bytes_sent,
            elapsed,
        });
    }
}

/// Whole percentage of `bytes_written` against `notional_total`, clamped to 0..=100.
pub fn percentage(bytes_written: u64, notional_total: u64) -> u8 {
    if notional_total == 0 {
        return 100;
    }
    let pct = (u128::from(bytes_written) * 100 / u128::from(notional_total)).min(100);
    pct as u8
}

/// Computes the next percentage and whether it differs from the last one
/// reported for the same item.
pub fn next_percentage(
    bytes_written: u64,
    notional_total: u64,
    last_reported: Option<u8>,
) -> (u8, bool) {
    let pct = percentage(bytes_written, notional_total);
    (pct, last_reported != Some(pct))
}

/// Per-item progress bookkeeping.
///
/// Emits 0 first and 100 last, never the same value twice, and otherwise
/// checks for a new percentage once at least 1% of the notional size has
/// been written since the previous check.
#[derive(Debug, Clone)]
pub struct ProgressState {
    bytes_written: u64,
    notional_total: u64,
    step: u64,
    checked_at: u64,
    last_reported: Option<u8>,
}

impl ProgressState {
    /// `size` is the item's real size, `None` for streams.
    pub fn new(size: Option<u64>) -> Self {
        let notional_total = size.unwrap_or(STREAM_NOTIONAL_SIZE);
        Self {
            bytes_written: 0,
            notional_total,
            step: notional_total / 100,
            checked_at: 0,
            last_reported: None,
        }
    }

    /// Forces the initial 0%.
    pub fn start(&mut self) -> Option<u8> {
        self.offer(0)
    }

    /// Records `n` more bytes and returns a percentage to report, if any.
    pub fn advance(&mut self, n: u64) -> Option<u8> {
        self.bytes_written += n;
        if self.bytes_written - self.checked_at < self.step {
            return None;
        }
        self.checked_at = self.bytes_written;
        let (pct, emit) = next_percentage(self.bytes_written, self.notional_total, self.last_reported);
        if emit {
            self.last_reported = Some(pct);
            Some(pct)
        } else {
            None
        }
    }

    /// Forces the final 100%.
    pub fn finish(&mut self) -> Option<u8> {
        self.offer(100)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn notional_total(&self) -> u64 {
        self.notional_total
    }

    fn offer(&mut self, pct: u8) -> Option<u8> {
        if self.last_reported == Some(pct) {
            None
        } else {
            self.last_reported = Some(pct);
            Some(pct)
        }
    }
}
