//! Certificate health checks.
//!
//! # Responsibilities
//! - Report how long a certificate/key pair remains valid
//! - Confirm an address is listed in a certificate's subject alternative names
//! - Verify a certificate chains to a supplied authority at the current time
//!
//! # Design Decisions
//! - Independent of the live connection path; callable at startup or from tooling
//! - Each check has a PEM-bytes form and a file-path form

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rustls::pki_types::CertificateDer;
use thiserror::Error;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::parse_x509_certificate;

use crate::tls::acceptor::{parse_certificates, parse_private_key, read_file, server_config};
use crate::tls::TlsSetupError;

/// Certificates closer than this to expiry are reported.
pub const EXPIRY_WARNING_DAYS: i64 = 30;

/// Longest issuer chain followed before giving up.
const MAX_CHAIN_DEPTH: usize = 8;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error(transparent)]
    Load(#[from] TlsSetupError),

    #[error("failed to parse certificate: {0}")]
    Parse(String),

    #[error("certificate {subject} expired at {not_after}")]
    Expired { subject: String, not_after: String },

    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    #[error("address {0} is not listed in the certificate's subject alternative names")]
    AddressNotCovered(String),

    #[error("no valid chain to a trusted authority: {0}")]
    NoValidChain(&'static str),
}

/// Expiry report for a certificate.
#[derive(Debug, Clone)]
pub struct CertificateStatus {
    pub subject: String,
    pub not_after: String,
    pub days_remaining: i64,
    pub expiring_soon: bool,
}

fn parse_der<'a>(der: &'a CertificateDer<'_>) -> Result<X509Certificate<'a>, CertificateError> {
    parse_x509_certificate(der.as_ref())
        .map(|(_, cert)| cert)
        .map_err(|e| CertificateError::Parse(e.to_string()))
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Load a certificate/key pair and report its remaining validity.
pub fn check_certificate_expiry_pem(
    cert_pem: &[u8],
    key_pem: &[u8],
) -> Result<CertificateStatus, CertificateError> {
    let certs = parse_certificates(cert_pem)?;
    let key = parse_private_key(key_pem)?;
    // Rejects keys that do not belong to the leaf certificate.
    server_config(certs.clone(), key)?;

    let leaf = parse_der(&certs[0])?;
    let subject = leaf.subject().to_string();
    let not_after = leaf.validity().not_after;
    let remaining = not_after.timestamp() - unix_now();

    if remaining <= 0 {
        return Err(CertificateError::Expired {
            subject,
            not_after: not_after.to_string(),
        });
    }

    let days_remaining = remaining / SECONDS_PER_DAY;
    let expiring_soon = days_remaining < EXPIRY_WARNING_DAYS;
    if expiring_soon {
        tracing::warn!(%subject, days_remaining, "Certificate expires soon");
    } else {
        tracing::info!(%subject, days_remaining, "Certificate valid");
    }

    Ok(CertificateStatus {
        subject,
        not_after: not_after.to_string(),
        days_remaining,
        expiring_soon,
    })
}

/// File-path form of [`check_certificate_expiry_pem`].
pub fn check_certificate_expiry(
    cert_path: &Path,
    key_path: &Path,
) -> Result<CertificateStatus, CertificateError> {
    check_certificate_expiry_pem(&read_file(cert_path)?, &read_file(key_path)?)
}

fn san_ip(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).ok().map(|b| IpAddr::V4(Ipv4Addr::from(b))),
        16 => <[u8; 16]>::try_from(bytes).ok().map(|b| IpAddr::V6(Ipv6Addr::from(b))),
        _ => None,
    }
}

/// Confirm `address` appears in the leaf certificate's IP or DNS SANs.
pub fn verify_certificate_address_pem(cert_pem: &[u8], address: &str) -> Result<(), CertificateError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(CertificateError::InvalidAddress(address.to_string()));
    }
    let ip = address.parse::<IpAddr>().ok();

    let certs = parse_certificates(cert_pem)?;
    let leaf = parse_der(&certs[0])?;
    let san = leaf
        .subject_alternative_name()
        .map_err(|e| CertificateError::Parse(e.to_string()))?;

    let covered = san.is_some_and(|ext| {
        ext.value.general_names.iter().any(|name| match name {
            GeneralName::IPAddress(bytes) => ip.is_some() && san_ip(bytes) == ip,
            GeneralName::DNSName(dns) => dns.eq_ignore_ascii_case(address),
            _ => false,
        })
    });

    if covered {
        Ok(())
    } else {
        Err(CertificateError::AddressNotCovered(address.to_string()))
    }
}

/// File-path form of [`verify_certificate_address_pem`].
pub fn verify_certificate_address(cert_path: &Path, address: &str) -> Result<(), CertificateError> {
    verify_certificate_address_pem(&read_file(cert_path)?, address)
}

fn issued_by(child: &X509Certificate<'_>, issuer: &X509Certificate<'_>) -> bool {
    child.issuer().as_raw() == issuer.subject().as_raw()
        && issuer.is_ca()
        && issuer.validity().is_valid()
        && child.verify_signature(Some(issuer.public_key())).is_ok()
}

/// Verify that the leaf in `cert_pem` chains to an authority in `ca_pem`.
///
/// Certificates after the leaf in `cert_pem` are used as intermediates.
/// Validity periods are checked against the current time.
pub fn verify_certificate_chain_pem(cert_pem: &[u8], ca_pem: &[u8]) -> Result<(), CertificateError> {
    let chain_der = parse_certificates(cert_pem)?;
    let roots_der = parse_certificates(ca_pem)?;

    let chain = chain_der
        .iter()
        .map(|der| parse_der(der))
        .collect::<Result<Vec<_>, _>>()?;
    let roots = roots_der
        .iter()
        .map(|der| parse_der(der))
        .collect::<Result<Vec<_>, _>>()?;

    let (leaf, intermediates) = chain
        .split_first()
        .ok_or(CertificateError::NoValidChain("empty certificate chain"))?;
    if !leaf.validity().is_valid() {
        return Err(CertificateError::NoValidChain("certificate is outside its validity period"));
    }

    // A certificate supplied as its own authority is trusted directly.
    if roots_der.iter().any(|root| root.as_ref() == chain_der[0].as_ref()) {
        return Ok(());
    }

    let mut current = leaf;
    for _ in 0..MAX_CHAIN_DEPTH {
        if roots.iter().any(|root| issued_by(current, root)) {
            return Ok(());
        }
        match intermediates.iter().find(|next| issued_by(current, next)) {
            Some(next) => current = next,
            None => break,
        }
    }

    Err(CertificateError::NoValidChain("no supplied authority signed this certificate"))
}

/// File-path form of [`verify_certificate_chain_pem`].
pub fn verify_certificate_chain(cert_path: &Path, ca_path: &Path) -> Result<(), CertificateError> {
    verify_certificate_chain_pem(&read_file(cert_path)?, &read_file(ca_path)?)
}
