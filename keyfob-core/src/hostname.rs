//! Simplified RFC 6125 hostname verification.
//!
//! Operates on names already extracted from a certificate, so the X.509
//! parsing stays in the IO crate. The rules:
//!
//! - Dotted-quad IPv4 hosts match only an IP-type SAN equal to the literal
//!   (RFC 2818 section 3.1 behaviour; IP addresses are outside RFC 6125).
//! - Other hosts match DNS-type SANs, case-insensitively, with a wildcard
//!   allowed in the leftmost label only: `*.example.com` matches
//!   `x.example.com` but not `x.y.example.com` and not `example.com`.
//! - When the certificate carries no DNS SAN at all, the most-specific
//!   Common Name is consulted under the same rules.

use thiserror::Error;

/// A single Subject Alternative Name entry relevant to hostname checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanEntry {
    /// A DNS-type entry (type 2).
    Dns(String),
    /// An IP-type entry (type 7), already rendered in dotted/colon form.
    Ip(String),
}

/// Why hostname verification failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum HostnameError {
    /// An IPv4 host had no equal IP-type SAN entry.
    #[error("no IP subject alternative name matches address {host}")]
    NoIpSanMatch { host: String },

    /// No DNS SAN (or fallback Common Name) matched the host.
    #[error("no subject alternative name or common name matches hostname {host}")]
    NoNameMatch { host: String },

    /// The certificate's names could not be parsed.
    #[error("failed to parse certificate names: {0}")]
    Unparsable(String),
}

/// Check whether `hostname` is a dotted-quad IPv4 literal.
#[must_use]
pub fn is_ipv4_literal(hostname: &str) -> bool {
    let sections: Vec<&str> = hostname.split('.').collect();
    if sections.len() != 4 {
        return false;
    }
    sections
        .iter()
        .all(|s| !s.is_empty() && s.parse::<u8>().is_ok())
}

/// Match a hostname against a certificate name, allowing a wildcard in the
/// leftmost label only.
#[must_use]
pub fn match_hostname(hostname: &str, certificate_name: &str) -> bool {
    if hostname.eq_ignore_ascii_case(certificate_name) {
        return true;
    }

    let cert_labels: Vec<&str> = certificate_name.split('.').collect();
    let host_labels: Vec<&str> = hostname.split('.').collect();

    // A wildcard stands in for exactly one label, so the counts must agree.
    if cert_labels.len() != host_labels.len() {
        return false;
    }
    if cert_labels.is_empty() || cert_labels[0] != "*" {
        return false;
    }

    // Everything right of the wildcard must match exactly.
    cert_labels[1..]
        .iter()
        .zip(&host_labels[1..])
        .all(|(c, h)| c.eq_ignore_ascii_case(h))
}

/// Verify a hostname against a certificate's extracted names.
///
/// `common_name` is the most-specific CN of the subject and is only
/// consulted when `sans` contains no DNS entry at all.
///
/// # Errors
///
/// Returns a [`HostnameError`] describing the first rule that failed.
pub fn verify_hostname(
    hostname: &str,
    sans: &[SanEntry],
    common_name: Option<&str>,
) -> Result<(), HostnameError> {
    if is_ipv4_literal(hostname) {
        for san in sans {
            if let SanEntry::Ip(ip) = san {
                if hostname.eq_ignore_ascii_case(ip) {
                    return Ok(());
                }
            }
        }
        return Err(HostnameError::NoIpSanMatch {
            host: hostname.to_string(),
        });
    }

    let mut any_dns_san = false;
    for san in sans {
        if let SanEntry::Dns(name) = san {
            any_dns_san = true;
            if match_hostname(hostname, name) {
                return Ok(());
            }
        }
    }

    if !any_dns_san {
        if let Some(cn) = common_name {
            if match_hostname(hostname, cn) {
                return Ok(());
            }
        }
    }

    Err(HostnameError::NoNameMatch {
        host: hostname.to_string(),
    })
}
