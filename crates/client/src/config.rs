//! Uploader configuration, stored as JSON.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use formpost_transfer::DEFAULT_BOUNDARY;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::UploadError;

/// Header names the uploader always sets itself; callers cannot override them.
pub const RESERVED_HEADERS: [&str; 5] = [
    "Connection",
    "Cache-Control",
    "Content-Type",
    "Content-Length",
    "Authorization",
];

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_PROXY_PORT: u16 = 8080;

/// Returns true if `name` is one of [`RESERVED_HEADERS`], ignoring case.
pub fn is_reserved_header(name: &str) -> bool {
    RESERVED_HEADERS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name.trim()))
}

/// HTTP proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    #[serde(default = "default_proxy_port")]
    pub port: u16,
}

impl ProxyConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Proxy URL in `http://host:port` form.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

fn default_proxy_port() -> u16 {
    DEFAULT_PROXY_PORT
}

/// Connection, authentication and TLS settings for uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploaderConfig {
    /// Target URL, `http` or `https`.
    pub url: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Applies to reading the reply once the body is sent, not to sending.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default)]
    pub proxy: Option<ProxyConfig>,

    /// Basic authentication is used only when this is set.
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_true")]
    pub validate_certificates: bool,

    /// Issuer organizations trusted when validation is off. Empty trusts all.
    #[serde(default)]
    pub accepted_issuers: Vec<String>,

    #[serde(default)]
    pub additional_headers: BTreeMap<String, String>,

    #[serde(default = "default_boundary")]
    pub boundary: String,
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

fn default_boundary() -> String {
    DEFAULT_BOUNDARY.to_string()
}

impl UploaderConfig {
    /// Creates a config for `url` with default timeouts and full certificate validation.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            proxy: None,
            username: None,
            password: None,
            validate_certificates: true,
            accepted_issuers: Vec::new(),
            additional_headers: BTreeMap::new(),
            boundary: default_boundary(),
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: Option<impl Into<String>>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = password.map(Into::into);
        self
    }

    pub fn with_proxy(mut self, host: impl Into<String>, port: u16) -> Self {
        self.proxy = Some(ProxyConfig::new(host, port));
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout_ms = connect.as_millis() as u64;
        self.read_timeout_ms = read.as_millis() as u64;
        self
    }

    /// Disables certificate and hostname validation. A non-empty
    /// `accepted_issuers` still restricts which issuers are trusted.
    pub fn without_certificate_validation(mut self, accepted_issuers: Vec<String>) -> Self {
        self.validate_certificates = false;
        self.accepted_issuers = accepted_issuers;
        self
    }

    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }

    /// Adds extra request headers, silently dropping reserved names.
    pub fn with_additional_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.set_additional_headers(headers);
        self
    }

    /// Replaces the extra request headers, silently dropping reserved names.
    pub fn set_additional_headers<I, K, V>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.additional_headers.clear();
        for (name, value) in headers {
            let name = name.into();
            if is_reserved_header(&name) {
                warn!(header = %name, "ignoring reserved header");
                continue;
            }
            self.additional_headers.insert(name, value.into());
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn use_authentication(&self) -> bool {
        self.username.is_some()
    }

    /// Parses [`url`](Self::url), accepting only `http` and `https`.
    pub fn parsed_url(&self) -> Result<Url, UploadError> {
        let url = Url::parse(&self.url)
            .map_err(|e| UploadError::InvalidUrl(format!("{}: {e}", self.url)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(UploadError::InvalidUrl(format!(
                "unsupported scheme {other:?} in {}",
                self.url
            ))),
        }
    }

    pub fn validate(&self) -> Result<(), UploadError> {
        self.parsed_url()?;
        if self.boundary.is_empty() {
            return Err(UploadError::Config("boundary must not be empty".into()));
        }
        if self.boundary.contains(['\r', '\n']) {
            return Err(UploadError::Config(
                "boundary must not contain line breaks".into(),
            ));
        }
        if let Some(proxy) = &self.proxy
            && proxy.host.trim().is_empty()
        {
            return Err(UploadError::Config("proxy host must not be empty".into()));
        }
        Ok(())
    }

    /// Reads a config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the config as pretty JSON, owner-readable only on Unix.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), UploadError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        set_permissions_0600(path);
        tracing::debug!(path = %path.display(), "uploader config saved");
        Ok(())
    }
}

fn set_permissions_0600(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}
