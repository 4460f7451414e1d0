//! Error types for upload operations.

use std::time::Duration;

use formpost_transfer::TransferError;
use formpost_trust::{IssuerRejection, TrustError};

/// Hard failures of an upload call.
///
/// A non-200 reply is not an error; it comes back as an
/// [`UploadResult`](crate::UploadResult) with [`is_error`](crate::UploadResult::is_error) set.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("no reply within {0:?} after the request body was sent")]
    ReplyTimedOut(Duration),

    #[error("server certificate rejected: {0}")]
    CertificateRejected(IssuerRejection),

    #[error(transparent)]
    Trust(#[from] TrustError),

    #[error("invalid upload URL: {0}")]
    InvalidUrl(String),

    #[error("invalid request header: {0}")]
    InvalidHeader(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UploadError {
    /// Offending issuer organization for certificate rejections.
    pub fn rejected_issuer(&self) -> Option<&str> {
        match self {
            Self::CertificateRejected(rejection) => rejection.issuer(),
            _ => None,
        }
    }
}
