//! Pure trust and device-flow logic for keyfob.
//!
//! This crate is intentionally IO-free:
//! - No filesystem operations
//! - No network calls
//! - No logging
//!
//! Dependencies are injected via traits:
//! - [`trust::AcceptedKeyStore`] - Persisted accepted-fingerprint storage
//!
//! The IO side (the rustls verifier, the HTTP transport, the console
//! frontend) lives in `keyfob-client`.
//!
//! # Modules
//!
//! - [`fingerprint`] - Public-key fingerprints used as trust identities
//! - [`hostname`] - Simplified RFC 6125 hostname verification
//! - [`device`] - Device Authorization Grant wire types and poll classification
//! - [`trust`] - Trust decisions and accepted-key evaluation

pub mod device;
pub mod fingerprint;
pub mod hostname;
pub mod trust;

pub use device::{BearerToken, DeviceCode, PollState, DEFAULT_POLL_INTERVAL, SLOW_DOWN_STEP};
pub use fingerprint::{Fingerprint, FingerprintError};
pub use hostname::{verify_hostname, HostnameError, SanEntry};
pub use trust::{AcceptedKeyStore, PromptChoice, TrustDecision};
