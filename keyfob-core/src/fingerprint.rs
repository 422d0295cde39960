//! Public-key fingerprints used as certificate trust identities.
//!
//! A fingerprint is the SHA-1 hash of a certificate's SubjectPublicKeyInfo
//! DER, encoded as standard base64. Hashing the public key rather than the
//! whole certificate keeps the identity stable across reissues of the same
//! key.
//!
//! Comparisons use constant-time equality.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

/// Errors that can occur when handling fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum FingerprintError {
    /// The fingerprint string is not base64, or decodes to the wrong length.
    #[error("invalid fingerprint format")]
    InvalidFormat,
}

/// A SHA-1 fingerprint of a certificate's public key.
///
/// The fingerprint string itself is public information; only equality
/// comparisons need timing-attack protection.
#[derive(Clone, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a DER-encoded SubjectPublicKeyInfo.
    #[must_use]
    pub fn from_spki_der(spki_der: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(spki_der);
        Self(STANDARD.encode(hasher.finalize()))
    }

    /// Parse a fingerprint from its base64 string form.
    ///
    /// # Errors
    ///
    /// Returns `FingerprintError::InvalidFormat` if the string is not base64
    /// encoding exactly 20 bytes.
    pub fn parse(s: &str) -> Result<Self, FingerprintError> {
        let decoded = STANDARD
            .decode(s)
            .map_err(|_| FingerprintError::InvalidFormat)?;
        if decoded.len() != 20 {
            return Err(FingerprintError::InvalidFormat);
        }
        Ok(Self(s.to_string()))
    }

    /// Get the fingerprint as a string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", self.0)
    }
}
