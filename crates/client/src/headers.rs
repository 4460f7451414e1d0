//! Request header assembly.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{
    AUTHORIZATION, CACHE_CONTROL, CONNECTION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
};
use tracing::warn;

use crate::UploadError;
use crate::config::{UploaderConfig, is_reserved_header};

/// `Authorization` value for Basic authentication. A missing password is
/// sent as empty.
pub fn basic_auth_value(username: &str, password: Option<&str>) -> String {
    let credentials = format!("{username}:{}", password.unwrap_or(""));
    format!("Basic {}", BASE64.encode(credentials))
}

/// Builds the fixed upload headers plus the caller's extra headers.
///
/// `Content-Length` is not included; the transport sets it from the
/// request framing.
pub fn build_headers(config: &UploaderConfig, content_type: &str) -> Result<HeaderMap, UploadError> {
    let mut headers = HeaderMap::new();

    headers.insert(CONTENT_TYPE, header_value(content_type)?);
    headers.insert(CONNECTION, HeaderValue::from_static("Keep-Alive"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    if let Some(username) = &config.username {
        let auth = basic_auth_value(username, config.password.as_deref());
        let mut value = header_value(&auth)?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    // Deserialized configs may still carry reserved names.
    for (name, value) in &config.additional_headers {
        if is_reserved_header(name) {
            warn!(header = %name, "ignoring reserved header");
            continue;
        }
        let header_name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| UploadError::InvalidHeader(format!("{name}: {e}")))?;
        headers.insert(header_name, header_value(value)?);
    }

    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue, UploadError> {
    HeaderValue::from_str(value).map_err(|e| UploadError::InvalidHeader(format!("{value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_headers_present() {
        let config = UploaderConfig::new("http://h/");
        let headers = build_headers(&config, "multipart/form-data;boundary=b").unwrap();
        assert_eq!(headers[CONTENT_TYPE], "multipart/form-data;boundary=b");
        assert_eq!(headers[CONNECTION], "Keep-Alive");
        assert_eq!(headers[CACHE_CONTROL], "no-cache");
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn basic_auth_encoding() {
        assert_eq!(
            basic_auth_value("Aladdin", Some("open sesame")),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
        assert_eq!(basic_auth_value("user", None), "Basic dXNlcjo=");
    }

    #[test]
    fn authorization_added_when_username_set() {
        let config = UploaderConfig::new("http://h/").with_credentials("user", None::<String>);
        let headers = build_headers(&config, "x").unwrap();
        assert_eq!(headers[AUTHORIZATION], "Basic dXNlcjo=");
        assert!(headers[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn reserved_names_filtered_even_when_deserialized() {
        let mut config = UploaderConfig::new("http://h/");
        config
            .additional_headers
            .insert("content-type".into(), "text/plain".into());
        config
            .additional_headers
            .insert("X-Upload-Id".into(), "42".into());

        let headers = build_headers(&config, "multipart/form-data;boundary=b").unwrap();
        assert_eq!(headers.get_all(CONTENT_TYPE).iter().count(), 1);
        assert_eq!(headers[CONTENT_TYPE], "multipart/form-data;boundary=b");
        assert_eq!(headers["x-upload-id"], "42");
    }

    #[test]
    fn invalid_extra_header_rejected() {
        let mut config = UploaderConfig::new("http://h/");
        config
            .additional_headers
            .insert("Bad Name".into(), "v".into());
        assert!(matches!(
            build_headers(&config, "x"),
            Err(UploadError::InvalidHeader(_))
        ));
    }
}
