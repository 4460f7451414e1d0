//! Uploads over real TLS handshakes with a relaxed trust policy.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use formpost_client::{FormField, UploadError, UploaderConfig, upload};
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

/// A leaf for `upload.invalid` signed by a CA whose organization is `org`.
fn certificate_chain(org: &str) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
    let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params.distinguished_name.push(DnType::OrganizationName, org);
    ca_params
        .distinguished_name
        .push(DnType::CommonName, format!("{org} Root"));
    let ca_key = KeyPair::generate().unwrap();
    let ca = ca_params.self_signed(&ca_key).unwrap();

    let leaf_params = CertificateParams::new(vec!["upload.invalid".to_string()]).unwrap();
    let leaf_key = KeyPair::generate().unwrap();
    let leaf = leaf_params.signed_by(&leaf_key, &ca, &ca_key).unwrap();

    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(leaf_key.serialize_der()));
    (vec![leaf.der().clone(), ca.der().clone()], key)
}

/// Serves one HTTPS request with certificates issued by `org`. The thread
/// yields the request body, or `None` when the handshake never completed.
fn serve_tls_once(org: &str) -> (String, JoinHandle<Option<Vec<u8>>>) {
    let (chain, key) = certificate_chain(org);
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("https://{}/upload", listener.local_addr().unwrap());

    let handle = std::thread::spawn(move || {
        let (tcp, _) = listener.accept().unwrap();
        tcp.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        let conn = rustls::ServerConnection::new(Arc::new(config)).unwrap();
        let mut tls = rustls::StreamOwned::new(conn, tcp);

        let body = read_request_body(&mut tls)?;
        tls.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\nConnection: close\r\n\r\nsecure")
            .ok()?;
        tls.conn.send_close_notify();
        tls.flush().ok()?;
        Some(body)
    });

    (url, handle)
}

/// Reads one fixed-length request and returns its body.
fn read_request_body(stream: &mut impl Read) -> Option<Vec<u8>> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_ascii_lowercase();
    let len: usize = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))?
        .trim()
        .parse()
        .ok()?;

    while data.len() < header_end + len {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
    }
    Some(data[header_end..header_end + len].to_vec())
}

fn fields() -> Vec<FormField> {
    vec![FormField::new("note", "over tls")]
}

#[tokio::test]
async fn listed_issuer_accepted_on_ip_host() {
    let (url, server) = serve_tls_once("Acme");
    let config = UploaderConfig::new(url).without_certificate_validation(vec!["Acme".into()]);

    let result = upload(&config, &[], &fields(), None).await.unwrap();
    let body = server.join().unwrap().unwrap();

    assert_eq!(result.status(), 200);
    assert!(!result.is_error());
    assert_eq!(result.response_text(), Some("secure\n"));
    assert!(body.windows(8).any(|w| w == b"over tls"));
}

#[tokio::test]
async fn unlisted_issuer_is_a_certificate_rejection() {
    let (url, server) = serve_tls_once("Other");
    let config = UploaderConfig::new(url).without_certificate_validation(vec!["Acme".into()]);

    let err = upload(&config, &[], &fields(), None).await.err().unwrap();
    assert!(server.join().unwrap().is_none());

    assert!(matches!(err, UploadError::CertificateRejected(_)));
    assert_eq!(err.rejected_issuer(), Some("Other"));
}

#[tokio::test]
async fn empty_list_trusts_any_issuer() {
    let (url, server) = serve_tls_once("Whoever");
    let config = UploaderConfig::new(url).without_certificate_validation(vec![]);

    let result = upload(&config, &[], &fields(), None).await.unwrap();
    server.join().unwrap();
    assert_eq!(result.status(), 200);
}

#[tokio::test]
async fn validating_client_fails_as_transport_error() {
    let (url, server) = serve_tls_once("Acme");
    let config = UploaderConfig::new(url);

    let err = upload(&config, &[], &fields(), None).await.err().unwrap();
    assert!(server.join().unwrap().is_none());

    assert!(matches!(err, UploadError::Transport(_)));
    assert_eq!(err.rejected_issuer(), None);
}
