//! The certificate trust engine.
//!
//! A [`rustls::client::danger::ServerCertVerifier`] that layers
//! validity-window and hostname checks with trust-on-first-use: a failure is
//! escalated to the [`PromptCoordinator`] keyed by the certificate's
//! public-key fingerprint, and an accepted fingerprint short-circuits all
//! prompting on later handshakes.
//!
//! Installing the engine is an explicit operation: build a client TLS config
//! with [`TrustEngine::client_config`] and hand it to the transport.
//! Constructing the engine has no process-wide side effects. Because the
//! custom verifier replaces rustls's own certificate checks entirely, the
//! transport performs no hostname identification of its own; the engine's is
//! authoritative.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tracing::{debug, warn};
use x509_parser::prelude::*;

use keyfob_core::hostname::{verify_hostname, HostnameError, SanEntry};
use keyfob_core::trust::{self, AcceptedKeyStore, PromptChoice, TrustDecision};
use keyfob_core::Fingerprint;

use crate::prompt::{CertPrompt, PromptBackend, PromptCategory, PromptCoordinator};

const EXPIRED_TITLE: &str = "Certificate expired";
const NOT_YET_VALID_TITLE: &str = "Certificate not yet valid";
const INVALID_TITLE: &str = "Invalid certificate";

/// Compute the trust fingerprint of a DER-encoded certificate.
///
/// Hashes the SubjectPublicKeyInfo, so reissued certificates for the same
/// key keep their identity.
pub fn fingerprint_from_cert_der(cert_der: &[u8]) -> Result<Fingerprint, rustls::Error> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|_| rustls::Error::InvalidCertificate(rustls::CertificateError::BadEncoding))?;
    Ok(Fingerprint::from_spki_der(cert.public_key().raw))
}

/// Trust-on-first-use certificate verifier.
pub struct TrustEngine {
    strict: bool,
    /// Fingerprints accepted for this session only.
    session: Mutex<HashSet<String>>,
    store: Arc<dyn AcceptedKeyStore>,
    prompts: PromptCoordinator,
}

impl TrustEngine {
    /// Create a new engine.
    ///
    /// With `strict` disabled every certificate is accepted unconditionally;
    /// this is logged loudly and exists for testing only.
    pub fn new(
        strict: bool,
        store: Arc<dyn AcceptedKeyStore>,
        backend: Arc<dyn PromptBackend>,
    ) -> Arc<Self> {
        if !strict {
            warn!(
                "NOT FOR PRODUCTION USE. All TLS certificates will be trusted \
                 regardless of status. This should only be used for testing."
            );
        }
        Arc::new(Self {
            strict,
            session: Mutex::new(HashSet::new()),
            store,
            prompts: PromptCoordinator::new(backend),
        })
    }

    /// Build a client TLS configuration with this engine spliced in as the
    /// certificate verifier.
    ///
    /// Idempotent; each call produces an independent config sharing the same
    /// engine state.
    pub fn client_config(self: &Arc<Self>) -> rustls::ClientConfig {
        rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::clone(self) as Arc<_>)
            .with_no_client_auth()
    }

    /// Whether `fingerprint` was accepted this session or is persisted.
    fn is_accepted(&self, fingerprint: &Fingerprint) -> bool {
        let session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        if session.contains(fingerprint.as_str()) {
            return true;
        }
        drop(session);
        trust::is_persisted(self.store.as_ref(), fingerprint)
    }

    /// Record the user's answer against the session and persisted sets and
    /// collapse it into a decision for the current handshake.
    fn resolve(&self, fingerprint: &Fingerprint, choice: PromptChoice) -> TrustDecision {
        match choice {
            PromptChoice::AcceptOnce | PromptChoice::AcceptAndSave => {
                self.session
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(fingerprint.as_str().to_string());
                if choice == PromptChoice::AcceptAndSave {
                    trust::remember(self.store.as_ref(), fingerprint);
                }
            }
            PromptChoice::Reject => {
                self.session
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(fingerprint.as_str());
                trust::forget(self.store.as_ref(), fingerprint);
            }
        }
        choice.decision()
    }

    /// Validate the validity window of every certificate in the chain.
    ///
    /// On the first out-of-window certificate: an accepted fingerprint
    /// trusts the chain outright; otherwise the user is asked, and an
    /// acceptance rescues the current handshake.
    fn check_chain_validity(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> Result<(), rustls::Error> {
        let now_ts = now.as_secs() as i64;

        for der in std::iter::once(end_entity).chain(intermediates.iter()) {
            let (_, cert) = X509Certificate::from_der(der.as_ref()).map_err(|_| {
                rustls::Error::InvalidCertificate(rustls::CertificateError::BadEncoding)
            })?;

            let subject = cert.subject().to_string();
            debug!(subject = %subject, "validating certificate");

            let validity = cert.validity();
            let not_yet_valid = now_ts < validity.not_before.timestamp();
            let expired = now_ts > validity.not_after.timestamp();
            if !not_yet_valid && !expired {
                continue;
            }

            let fingerprint = Fingerprint::from_spki_der(cert.public_key().raw);
            if self.is_accepted(&fingerprint) {
                debug!("accepting server certificate, it has previously been accepted");
                return Ok(());
            }

            let (title, detail) = if expired {
                (
                    EXPIRED_TITLE,
                    format!("certificate expired at {}", validity.not_after),
                )
            } else {
                (
                    NOT_YET_VALID_TITLE,
                    format!("certificate not valid before {}", validity.not_before),
                )
            };
            let message = format!(
                "The certificate presented by \"{subject}\" is outside its validity \
                 period ({detail}). Connecting anyway exposes you to \
                 man-in-the-middle attacks."
            );

            let choice = self.prompts.ask(CertPrompt {
                category: PromptCategory::Warning,
                title: title.to_string(),
                message,
                fingerprint: fingerprint.as_str().to_string(),
                hostname: subject,
                detail: detail.clone(),
            });

            return match self.resolve(&fingerprint, choice) {
                TrustDecision::Accept => Ok(()),
                TrustDecision::Reject => Err(rustls::Error::InvalidCertificate(if expired {
                    rustls::CertificateError::Expired
                } else {
                    rustls::CertificateError::NotValidYet
                })),
            };
        }

        Ok(())
    }

    /// Verify the server name against the leaf certificate, escalating a
    /// mismatch or an unparsable name source to the user.
    fn check_hostname(
        &self,
        end_entity: &CertificateDer<'_>,
        server_name: &ServerName<'_>,
    ) -> Result<(), rustls::Error> {
        let (_, cert) = X509Certificate::from_der(end_entity.as_ref()).map_err(|_| {
            rustls::Error::InvalidCertificate(rustls::CertificateError::BadEncoding)
        })?;

        let fingerprint = Fingerprint::from_spki_der(cert.public_key().raw);
        if self.is_accepted(&fingerprint) {
            debug!("accepting certificate, it has previously been accepted");
            return Ok(());
        }

        let hostname = match server_name {
            ServerName::DnsName(dns) => dns.as_ref().to_string(),
            ServerName::IpAddress(ip) => std::net::IpAddr::from(*ip).to_string(),
            _ => return Err(rustls::Error::General("unsupported server name type".into())),
        };

        let verified = match collect_names(&cert) {
            Ok((sans, common_name)) => verify_hostname(&hostname, &sans, common_name.as_deref()),
            Err(err) => Err(err),
        };
        let failure = match verified {
            Ok(()) => return Ok(()),
            Err(failure) => failure,
        };

        let message = format!(
            "The certificate presented by \"{hostname}\" is not valid for that \
             address: {failure}. Connecting anyway exposes you to \
             man-in-the-middle attacks."
        );
        let choice = self.prompts.ask(CertPrompt {
            category: PromptCategory::Warning,
            title: INVALID_TITLE.to_string(),
            message,
            fingerprint: fingerprint.as_str().to_string(),
            hostname,
            detail: failure.to_string(),
        });

        match self.resolve(&fingerprint, choice) {
            TrustDecision::Accept => Ok(()),
            TrustDecision::Reject => Err(rustls::Error::InvalidCertificate(
                rustls::CertificateError::NotValidForName,
            )),
        }
    }
}

/// Extract the hostname-relevant names from a certificate: its SAN entries
/// and, for the no-DNS-SAN fallback, the most-specific (last) Common Name.
fn collect_names(
    cert: &X509Certificate<'_>,
) -> Result<(Vec<SanEntry>, Option<String>), HostnameError> {
    let mut sans = Vec::new();

    let extension = cert
        .subject_alternative_name()
        .map_err(|e| HostnameError::Unparsable(e.to_string()))?;
    if let Some(extension) = extension {
        for name in &extension.value.general_names {
            match name {
                GeneralName::DNSName(dns) => sans.push(SanEntry::Dns((*dns).to_string())),
                GeneralName::IPAddress(bytes) => match bytes.len() {
                    4 => sans.push(SanEntry::Ip(
                        std::net::Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]).to_string(),
                    )),
                    16 => {
                        let mut octets = [0u8; 16];
                        octets.copy_from_slice(bytes);
                        sans.push(SanEntry::Ip(std::net::Ipv6Addr::from(octets).to_string()));
                    }
                    _ => {
                        return Err(HostnameError::Unparsable(format!(
                            "IP subject alternative name of length {}",
                            bytes.len()
                        )))
                    }
                },
                _ => {}
            }
        }
    }

    let common_name = cert
        .subject()
        .iter_common_name()
        .last()
        .and_then(|attr| attr.as_str().ok())
        .map(String::from);

    Ok((sans, common_name))
}

impl rustls::client::danger::ServerCertVerifier for TrustEngine {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        if !self.strict {
            return Ok(rustls::client::danger::ServerCertVerified::assertion());
        }

        self.check_chain_validity(end_entity, intermediates, now)?;
        self.check_hostname(end_entity, server_name)?;

        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

impl std::fmt::Debug for TrustEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustEngine")
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}
