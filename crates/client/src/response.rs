//! Turns the server's reply into an [`UploadResult`].

use tracing::debug;

use crate::text::{status_code_text, strip_html};
use crate::transport::Reply;

const UNAUTHORIZED: u16 = 401;

/// Status and response text of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    status: u16,
    response_text: Option<String>,
}

impl UploadResult {
    pub fn new(status: u16, response_text: Option<String>) -> Self {
        Self {
            status,
            response_text,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// True for every status except 200, including other 2xx codes.
    pub fn is_error(&self) -> bool {
        self.status != 200
    }

    /// Raw response body as text, one `\n`-terminated line per body line.
    /// `None` for 401 replies and when no body could be read.
    pub fn response_text(&self) -> Option<&str> {
        self.response_text.as_deref()
    }

    /// Response text with HTML markup removed.
    pub fn response_text_no_html(&self) -> Option<String> {
        self.response_text.as_deref().map(strip_html)
    }

    /// Status code with its reason phrase, e.g. `404 Not Found`.
    pub fn status_text(&self) -> String {
        status_code_text(self.status)
    }
}

/// Reads the reply body. 401 replies are never read; otherwise the success
/// body is tried first and the error body second.
pub(crate) async fn interpret(mut reply: Box<dyn Reply>) -> UploadResult {
    let status = reply.status();
    if status == UNAUTHORIZED {
        return UploadResult::new(status, None);
    }

    let body = match reply.read_body().await {
        Ok(body) => Some(body),
        Err(e) => {
            debug!(status, error = %e, "response body unavailable, reading error body");
            reply.read_error_body().await
        }
    };

    UploadResult::new(status, body.map(|b| body_to_text(&b)))
}

/// Re-joins the body's lines, terminating each with `\n`.
fn body_to_text(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut out = String::with_capacity(text.len() + 1);
    for line in text.lines() {
        out.push_str(line);
        out.push('\n');
    }
    out
}
