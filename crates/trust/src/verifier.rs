use std::sync::{Arc, Mutex, PoisonError};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{WebPkiSupportedAlgorithms, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, OtherError, SignatureScheme};
use tracing::{debug, warn};

use crate::issuer::{IssuerCheck, IssuerRejection, check_issuer};

/// Server certificate verifier that skips chain, expiry and hostname
/// validation and only applies the issuer allow-list to the leaf.
///
/// Handshake signatures are still checked so the peer must hold the key
/// of the certificate it presents.
#[derive(Debug)]
pub struct IssuerAllowListVerifier {
    accepted: Vec<String>,
    algorithms: WebPkiSupportedAlgorithms,
    rejection: Mutex<Option<IssuerRejection>>,
}

impl IssuerAllowListVerifier {
    pub fn new(accepted: Vec<String>, algorithms: WebPkiSupportedAlgorithms) -> Self {
        Self {
            accepted,
            algorithms,
            rejection: Mutex::new(None),
        }
    }

    /// Most recent rejection, if a handshake was refused.
    pub fn last_rejection(&self) -> Option<IssuerRejection> {
        self.rejection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn accepted_issuers(&self) -> &[String] {
        &self.accepted
    }
}

impl ServerCertVerifier for IssuerAllowListVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match check_issuer(end_entity.as_ref(), &self.accepted) {
            IssuerCheck::Accepted => {
                debug!(server = ?server_name, "server certificate accepted without validation");
                Ok(ServerCertVerified::assertion())
            }
            IssuerCheck::Rejected(rejection) => {
                warn!(server = ?server_name, reason = %rejection, "server certificate rejected");
                *self.rejection.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(rejection.clone());
                Err(rustls::Error::InvalidCertificate(CertificateError::Other(
                    OtherError(Arc::new(rejection)),
                )))
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
