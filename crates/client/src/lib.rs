//! HTTP(S) `multipart/form-data` uploads.
//!
//! Bodies are streamed from their sources one chunk at a time, with
//! `Content-Length` declared up front whenever every item's size is known.
//! Certificate validation can be relaxed per request, optionally keeping an
//! allow-list of trusted issuer organizations.
//!
//! ```no_run
//! # async fn run() -> Result<(), formpost_client::UploadError> {
//! use formpost_client::{UploaderConfig, upload_file};
//!
//! let config = UploaderConfig::new("https://example.com/upload")
//!     .with_credentials("user", Some("secret"));
//! let result = upload_file(&config, "report.pdf").await?;
//! if result.is_error() {
//!     eprintln!("upload failed: {}", result.status_text());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod headers;
pub mod response;
pub mod text;
pub mod transport;
mod uploader;

pub use config::{ProxyConfig, RESERVED_HEADERS, UploaderConfig, is_reserved_header};
pub use error::UploadError;
pub use response::UploadResult;
pub use text::{file_size_as_str, status_code_text, strip_html};
pub use transport::{HttpTransport, OpenedRequest, Reply, UploadTransport};
pub use uploader::{upload, upload_file, upload_with};

pub use formpost_transfer::{
    FileSource, FormField, StreamSource, TransferError, UploadEvent, UploadItem, UploadObserver,
    UploadPlan,
};
pub use formpost_trust::{IssuerRejection, TrustPolicy};
