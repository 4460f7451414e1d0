//! HTTP transport behind the uploader.
//!
//! [`UploadTransport`] is the seam between the body writer and the HTTP
//! stack: opening a request yields a writable body and a future for the
//! server's reply. [`HttpTransport`] is the `reqwest` implementation.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use formpost_transfer::{CHUNK_SIZE, Framing};
use formpost_trust::TrustPolicy;
use reqwest::Url;
use reqwest::header::{CONTENT_LENGTH, HeaderMap};
use tokio::io::AsyncWrite;
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::UploadError;
use crate::config::UploaderConfig;
use crate::headers::build_headers;

/// Writable request body.
pub type BodyWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Resolves once the server's status line and headers have arrived.
pub type ReplyFuture = Pin<Box<dyn Future<Output = Result<Box<dyn Reply>, UploadError>> + Send>>;

/// A request whose body is being written.
///
/// Shutting down `body` completes the request. Dropping `reply` before it
/// resolves abandons the request.
pub struct OpenedRequest {
    pub body: BodyWriter,
    pub reply: ReplyFuture,
}

/// The server's answer to an upload request.
pub trait Reply: Send {
    fn status(&self) -> u16;

    /// Reads the response body. Fails without consuming it when the status
    /// is 400 or above.
    fn read_body(&mut self) -> Pin<Box<dyn Future<Output = io::Result<Vec<u8>>> + Send + '_>>;

    /// Reads the body of an error reply. `None` when empty or unreadable.
    fn read_error_body(&mut self) -> Pin<Box<dyn Future<Output = Option<Vec<u8>>> + Send + '_>>;
}

/// Opens upload requests.
///
/// Abstracted so the uploader can be exercised without a network.
pub trait UploadTransport: Send + Sync {
    /// Starts a request with the given body framing.
    fn open(
        &self,
        framing: Framing,
    ) -> Pin<Box<dyn Future<Output = Result<OpenedRequest, UploadError>> + Send + '_>>;

    /// Longest wait for the reply once the body is complete. `None` waits
    /// indefinitely.
    fn reply_timeout(&self) -> Option<Duration> {
        None
    }
}

/// `reqwest`-backed transport for a single upload call.
///
/// The client, and with it any relaxed trust policy, is built per call and
/// never shared. Redirects are not followed: the status of the upload
/// exchange itself is what gets reported.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: Url,
    headers: HeaderMap,
    trust: Option<TrustPolicy>,
    read_timeout: Duration,
}

impl HttpTransport {
    /// Builds a transport for `config`, sending `content_type` as the
    /// request's `Content-Type`.
    pub fn from_config(config: &UploaderConfig, content_type: &str) -> Result<Self, UploadError> {
        config.validate()?;
        let url = config.parsed_url()?;
        let headers = build_headers(config, content_type)?;

        let mut builder = reqwest::Client::builder()
            .http1_only()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.connect_timeout());

        builder = match &config.proxy {
            Some(proxy) => builder.proxy(reqwest::Proxy::all(proxy.url())?),
            None => builder.no_proxy(),
        };

        let mut trust = None;
        if !config.validate_certificates && url.scheme() == "https" {
            let policy = TrustPolicy::build(&config.accepted_issuers)?;
            builder = builder.use_preconfigured_tls(policy.client_config());
            debug!(
                accepted_issuers = policy.accepted_issuers().len(),
                "certificate validation disabled for this request"
            );
            trust = Some(policy);
        }

        Ok(Self {
            client: builder.build()?,
            url,
            headers,
            trust,
            read_timeout: config.read_timeout(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl UploadTransport for HttpTransport {
    fn open(
        &self,
        framing: Framing,
    ) -> Pin<Box<dyn Future<Output = Result<OpenedRequest, UploadError>> + Send + '_>> {
        Box::pin(async move {
            // One chunk of slack: the writer waits while the HTTP stack drains.
            let (writer, reader) = tokio::io::duplex(CHUNK_SIZE);
            let body = reqwest::Body::wrap_stream(ReaderStream::with_capacity(reader, CHUNK_SIZE));

            let mut request = self
                .client
                .post(self.url.clone())
                .headers(self.headers.clone())
                .body(body);
            if let Framing::Fixed(len) = framing {
                request = request.header(CONTENT_LENGTH, len);
            }

            debug!(url = %self.url, ?framing, "opening upload request");
            let send = AbortOnDrop(tokio::spawn(request.send()));
            let trust = self.trust.clone();
            let read_timeout = self.read_timeout;

            let reply: ReplyFuture = Box::pin(async move {
                let mut send = send;
                match (&mut send.0).await {
                    Ok(Ok(response)) => {
                        Ok(Box::new(HttpReply::new(response, read_timeout)) as Box<dyn Reply>)
                    }
                    Ok(Err(e)) => Err(classify_send_error(e, trust.as_ref())),
                    Err(e) => Err(UploadError::Io(io::Error::other(e))),
                }
            });

            Ok(OpenedRequest {
                body: Box::new(writer),
                reply,
            })
        })
    }

    fn reply_timeout(&self) -> Option<Duration> {
        Some(self.read_timeout)
    }
}

/// Reports a handshake refused by the issuer allow-list as such rather than
/// as a generic connection failure.
fn classify_send_error(err: reqwest::Error, trust: Option<&TrustPolicy>) -> UploadError {
    match trust.and_then(TrustPolicy::last_rejection) {
        Some(rejection) => UploadError::CertificateRejected(rejection),
        None => UploadError::Transport(err),
    }
}

/// Cancels the in-flight request task when the reply is abandoned.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A `reqwest` response. The body can be read once, within the read
/// timeout.
struct HttpReply {
    status: u16,
    response: Option<reqwest::Response>,
    read_timeout: Duration,
}

impl HttpReply {
    fn new(response: reqwest::Response, read_timeout: Duration) -> Self {
        Self {
            status: response.status().as_u16(),
            response: Some(response),
            read_timeout,
        }
    }

    async fn bytes(response: reqwest::Response, limit: Duration) -> io::Result<Vec<u8>> {
        match tokio::time::timeout(limit, response.bytes()).await {
            Ok(Ok(bytes)) => Ok(bytes.to_vec()),
            Ok(Err(e)) => Err(io::Error::other(e)),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "timed out reading response body",
            )),
        }
    }
}

impl Reply for HttpReply {
    fn status(&self) -> u16 {
        self.status
    }

    fn read_body(&mut self) -> Pin<Box<dyn Future<Output = io::Result<Vec<u8>>> + Send + '_>> {
        Box::pin(async move {
            if self.status >= 400 {
                return Err(io::Error::other(format!(
                    "server returned HTTP {}",
                    self.status
                )));
            }
            let response = self
                .response
                .take()
                .ok_or_else(|| io::Error::other("response body already read"))?;
            Self::bytes(response, self.read_timeout).await
        })
    }

    fn read_error_body(&mut self) -> Pin<Box<dyn Future<Output = Option<Vec<u8>>> + Send + '_>> {
        Box::pin(async move {
            let response = self.response.take()?;
            match Self::bytes(response, self.read_timeout).await {
                Ok(bytes) if !bytes.is_empty() => Some(bytes),
                Ok(_) => None,
                Err(e) => {
                    debug!(error = %e, "error body unreadable");
                    None
                }
            }
        })
    }
}
