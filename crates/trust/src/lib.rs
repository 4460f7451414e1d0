//! TLS trust override for uploads with certificate validation disabled.
//!
//! A [`TrustPolicy`] is built fresh for every request and attached only to
//! that request's client, so a relaxed policy never affects other
//! connections in the same process.

mod issuer;
mod verifier;

use std::sync::Arc;

use rustls::ClientConfig;
use tracing::debug;

pub use issuer::{IssuerCheck, IssuerRejection, check_issuer};
pub use verifier::IssuerAllowListVerifier;

/// Errors produced while building a trust policy.
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    #[error("cannot build TLS trust policy: {0}")]
    Construction(#[from] rustls::Error),
}

/// Relaxed TLS validation: any chain, any hostname, and optionally only
/// leaf certificates whose issuer organization is on an allow-list.
///
/// Client certificates are never requested or sent.
#[derive(Debug, Clone)]
pub struct TrustPolicy {
    verifier: Arc<IssuerAllowListVerifier>,
    config: Arc<ClientConfig>,
}

impl TrustPolicy {
    /// Builds a policy. An empty `accepted_issuers` trusts every certificate.
    pub fn build(accepted_issuers: &[String]) -> Result<Self, TrustError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier = Arc::new(IssuerAllowListVerifier::new(
            accepted_issuers.to_vec(),
            provider.signature_verification_algorithms,
        ));

        let mut config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(verifier.clone())
            .with_no_client_auth();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        debug!(
            accepted_issuers = accepted_issuers.len(),
            "built relaxed TLS trust policy"
        );

        Ok(Self {
            verifier,
            config: Arc::new(config),
        })
    }

    /// A rustls client configuration carrying this policy.
    pub fn client_config(&self) -> ClientConfig {
        (*self.config).clone()
    }

    pub fn accepted_issuers(&self) -> &[String] {
        self.verifier.accepted_issuers()
    }

    /// True when no allow-list is configured.
    pub fn trusts_any_issuer(&self) -> bool {
        self.accepted_issuers().is_empty()
    }

    /// Hostname check used with this policy: every name is accepted.
    pub fn verify_hostname(&self, _hostname: &str) -> bool {
        true
    }

    /// The issuer rejection behind a failed handshake, if any.
    pub fn last_rejection(&self) -> Option<IssuerRejection> {
        self.verifier.last_rejection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_without_allow_list() {
        let policy = TrustPolicy::build(&[]).unwrap();
        assert!(policy.trusts_any_issuer());
        assert!(policy.verify_hostname("anything.invalid"));
        assert!(policy.last_rejection().is_none());

        let config = policy.client_config();
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }

    #[test]
    fn keeps_allow_list() {
        let accepted = vec!["Acme".to_string(), "Example Org".to_string()];
        let policy = TrustPolicy::build(&accepted).unwrap();
        assert!(!policy.trusts_any_issuer());
        assert_eq!(policy.accepted_issuers(), accepted.as_slice());
    }

    #[test]
    fn policies_are_independent() {
        let a = TrustPolicy::build(&["Acme".to_string()]).unwrap();
        let b = TrustPolicy::build(&[]).unwrap();
        assert_ne!(a.accepted_issuers(), b.accepted_issuers());
    }
}
