//! Issuer organization allow-list check on a DER leaf certificate.

use x509_parser::parse_x509_certificate;

/// Outcome of checking a leaf certificate against the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuerCheck {
    Accepted,
    Rejected(IssuerRejection),
}

impl IssuerCheck {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Why a server certificate failed the issuer allow-list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssuerRejection {
    #[error("certificate has no issuer information, cannot check it against the accepted issuers")]
    MissingIssuer,

    #[error("certificate issuer has no Organization (O) attribute, cannot check it against the accepted issuers")]
    MissingOrganization,

    #[error("certificate issuer Organization (O) is empty, cannot check it against the accepted issuers")]
    EmptyOrganization,

    #[error("certificate is issued by \"{issuer}\" which is not on the list of accepted issuers")]
    NotAccepted { issuer: String },

    #[error("certificate could not be parsed: {0}")]
    Unparseable(String),
}

impl IssuerRejection {
    /// Offending issuer organization, when one was found.
    pub fn issuer(&self) -> Option<&str> {
        match self {
            Self::NotAccepted { issuer } => Some(issuer),
            _ => None,
        }
    }
}

/// Checks the issuer O attribute of `leaf_der` against `accepted`.
///
/// An empty allow-list accepts every certificate without parsing it. With
/// several O attributes the certificate passes if any of them is listed.
pub fn check_issuer(leaf_der: &[u8], accepted: &[String]) -> IssuerCheck {
    if accepted.is_empty() {
        return IssuerCheck::Accepted;
    }

    let cert = match parse_x509_certificate(leaf_der) {
        Ok((_, cert)) => cert,
        Err(e) => return IssuerCheck::Rejected(IssuerRejection::Unparseable(e.to_string())),
    };

    let issuer = cert.issuer();
    if issuer.iter_attributes().next().is_none() {
        return IssuerCheck::Rejected(IssuerRejection::MissingIssuer);
    }

    let mut last_seen: Option<&str> = None;
    for attr in issuer.iter_organization() {
        let value = match attr.as_str() {
            Ok(v) => v,
            Err(e) => return IssuerCheck::Rejected(IssuerRejection::Unparseable(e.to_string())),
        };
        if value.is_empty() {
            return IssuerCheck::Rejected(IssuerRejection::EmptyOrganization);
        }
        if accepted.iter().any(|a| a == value) {
            return IssuerCheck::Accepted;
        }
        last_seen = Some(value);
    }

    match last_seen {
        Some(issuer) => IssuerCheck::Rejected(IssuerRejection::NotAccepted {
            issuer: issuer.to_string(),
        }),
        None => IssuerCheck::Rejected(IssuerRejection::MissingOrganization),
    }
}
