//! Streaming `multipart/form-data` bodies with per-item progress.
//!
//! The crate splits an upload into three steps:
//!
//! 1. **Items**: files (size known from metadata) or opaque byte streams
//!    (size unknown), see [`UploadItem`].
//! 2. **Plan**: [`UploadPlan::build`] lays out every part's header and
//!    footer up front so the exact body length is known before the first
//!    byte is sent, whenever every item has a known size.
//! 3. **Transmit**: [`transmit`] writes the plan to any `AsyncWrite` in
//!    fixed-size chunks, reporting deduplicated percentages to an
//!    [`UploadObserver`].
//!
//! The HTTP side (connection, headers, response) lives in `formpost-client`.

mod item;
mod plan;
mod progress;
mod transmit;
mod types;
mod validation;

pub use item::{FileSource, StreamSource, UploadItem, detect_content_type};
pub use plan::PlanBuilder;
pub use progress::{ProgressState, UploadEvent, UploadObserver, next_percentage, percentage};
pub use transmit::{TransmitReport, transmit};
pub use types::{FormField, Framing, Part, PartSource, UploadPlan};
pub use validation::validate_header_token;

/// Size of the buffer used to copy item bytes into the request body.
///
/// This is the only per-upload buffer, so it bounds memory use regardless
/// of item size.
pub const CHUNK_SIZE: usize = 8192;

/// Notional total used to compute percentages for items of unknown size.
pub const STREAM_NOTIONAL_SIZE: u64 = 512 * 1024;

/// Default multipart boundary token.
pub const DEFAULT_BOUNDARY: &str = "*****X99611299X******";

/// Form field name used for items that do not set one.
pub const DEFAULT_FIELD_NAME: &str = "file";

/// MIME type used when none is given and none can be guessed.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("cannot read upload item {item}: {source}")]
    ItemRead {
        item: String,
        #[source]
        source: std::io::Error,
    },

    #[error("writing request body failed: {0}")]
    Sink(#[source] std::io::Error),

    #[error("upload item {item} changed size: planned {expected} bytes, read {actual}")]
    SizeMismatch {
        item: String,
        expected: u64,
        actual: u64,
    },

    #[error("stream item already consumed: {0}")]
    StreamConsumed(String),

    #[error("invalid header value: {0}")]
    InvalidHeaderValue(String),
}
