//! TLS handshake failure classification.
//!
//! Both functions here are pure and match on the lower-cased error text, so
//! they work for rustls error renderings (`InvalidContentType`,
//! `NoCipherSuitesInCommon`) as well as the phrasing other stacks use.

use std::fmt;

/// Coarse category of a handshake failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlsErrorCategory {
    Certificate,
    CipherSuite,
    Record,
    ProtocolVersion,
    Handshake,
    Unknown,
}

impl TlsErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            TlsErrorCategory::Certificate => "certificate",
            TlsErrorCategory::CipherSuite => "cipher_suite",
            TlsErrorCategory::Record => "record",
            TlsErrorCategory::ProtocolVersion => "protocol_version",
            TlsErrorCategory::Handshake => "handshake",
            TlsErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TlsErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category patterns, checked in order. The first category with a matching
/// pattern wins, so a message mentioning both a certificate and a cipher is
/// a certificate failure.
const CATEGORY_PATTERNS: &[(TlsErrorCategory, &[&str])] = &[
    (
        TlsErrorCategory::Certificate,
        &["certificate", "x509", "unknownca", "unknownissuer"],
    ),
    (
        TlsErrorCategory::CipherSuite,
        &["cipher", "nociphersuitesincommon"],
    ),
    (
        TlsErrorCategory::Record,
        &["record", "invalidcontenttype", "corrupt message", "badrecordmac"],
    ),
    (
        TlsErrorCategory::ProtocolVersion,
        &[
            "protocol version",
            "protocolversion",
            "unsupported version",
            "unsupported versions",
            "supportedversions",
            "sslv2",
        ],
    ),
    (TlsErrorCategory::Handshake, &["handshake"]),
];

/// Failure texts produced by internet-wide scanners and vulnerability probes
/// rather than by real clients.
const SCANNER_SIGNATURES: &[&str] = &[
    // Stale protocol offers.
    "client offered only unsupported versions",
    "unsupported sslv2 handshake received",
    "peer is incompatible: supportedversionsextensionrequired",
    "received fatal alert: protocolversion",
    "received fatal alert: inappropriatefallback",
    // Broken or forged records.
    "bad record mac",
    "received fatal alert: badrecordmac",
    "first record does not look like a tls handshake",
    "received corrupt message of type invalidcontenttype",
    // Self-signed certificate rejections by probing clients.
    "unknown certificate authority",
    "received fatal alert: unknownca",
    // Cipher probes.
    "no cipher suite supported by both client and server",
    "nociphersuitesincommon",
    // Connect-and-drop sweeps.
    "connection reset by peer",
    "tls handshake eof",
];

/// Map a handshake failure message to its category.
pub fn classify_category(message: &str) -> TlsErrorCategory {
    let message = message.to_ascii_lowercase();
    CATEGORY_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| message.contains(p)))
        .map(|(category, _)| *category)
        .unwrap_or(TlsErrorCategory::Unknown)
}

/// Whether a failure message matches a known scanner signature.
///
/// Only used to pick a log level; it never affects admission.
pub fn is_scanner_signature(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    SCANNER_SIGNATURES.iter().any(|sig| message.contains(sig))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_by_substring() {
        let cases = [
            ("invalid peer certificate: UnknownIssuer", TlsErrorCategory::Certificate),
            ("x509: certificate signed by unknown authority", TlsErrorCategory::Certificate),
            ("peer is incompatible: NoCipherSuitesInCommon", TlsErrorCategory::CipherSuite),
            ("tls: bad record MAC", TlsErrorCategory::Record),
            ("received corrupt message of type InvalidContentType", TlsErrorCategory::Record),
            ("tls: client offered only unsupported versions: [301]", TlsErrorCategory::ProtocolVersion),
            ("received fatal alert: ProtocolVersion", TlsErrorCategory::ProtocolVersion),
            ("received fatal alert: HandshakeFailure", TlsErrorCategory::Handshake),
            ("unexpected end of file", TlsErrorCategory::Unknown),
        ];
        for (message, expected) in cases {
            assert_eq!(classify_category(message), expected, "{message}");
        }
    }

    #[test]
    fn certificate_wins_over_cipher() {
        let message = "certificate rejected while negotiating cipher";
        assert_eq!(classify_category(message), TlsErrorCategory::Certificate);
        assert_eq!(classify_category(message), classify_category(message));
    }

    #[test]
    fn record_wins_over_handshake() {
        assert_eq!(
            classify_category("tls: first record does not look like a TLS handshake"),
            TlsErrorCategory::Record
        );
    }

    #[test]
    fn category_names() {
        assert_eq!(TlsErrorCategory::CipherSuite.to_string(), "cipher_suite");
        assert_eq!(TlsErrorCategory::ProtocolVersion.as_str(), "protocol_version");
    }

    #[test]
    fn scanner_signatures_match_embedded() {
        for sig in SCANNER_SIGNATURES {
            let message = format!("accept 203.0.113.9:51234: {}: extra context", sig.to_uppercase());
            assert!(is_scanner_signature(&message), "{message}");
        }
        assert!(is_scanner_signature("remote error: tls: bad record MAC"));
        assert!(is_scanner_signature("tls: client offered only unsupported versions: [302 301]"));
        assert!(is_scanner_signature("x509: unknown certificate authority"));
    }

    #[test]
    fn ordinary_failures_are_not_scanner_noise() {
        assert!(!is_scanner_signature("invalid peer certificate: Expired"));
        assert!(!is_scanner_signature("something completely different"));
    }
}
