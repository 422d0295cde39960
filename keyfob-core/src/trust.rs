//! Trust decisions and accepted-key evaluation.
//!
//! The persisted set of accepted fingerprints belongs to the caller and is
//! reached only through [`AcceptedKeyStore`]. Implementations should persist
//! the keys for trust-on-first-use to hold across sessions; `keyfob-client`
//! ships file-backed and in-memory implementations.

use crate::fingerprint::Fingerprint;

/// The outcome of one verification attempt. Ephemeral, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    Accept,
    Reject,
}

/// The user's answer to a certificate prompt.
///
/// Every interactive certificate problem offers all three choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    /// Trust this key for the rest of the session only.
    AcceptOnce,
    /// Trust this key and persist it to the accepted-key store.
    AcceptAndSave,
    /// Do not trust this key.
    Reject,
}

impl PromptChoice {
    /// Collapse the choice into the decision for the current handshake.
    #[must_use]
    pub fn decision(self) -> TrustDecision {
        match self {
            PromptChoice::AcceptOnce | PromptChoice::AcceptAndSave => TrustDecision::Accept,
            PromptChoice::Reject => TrustDecision::Reject,
        }
    }
}

/// Caller-owned storage for durably accepted fingerprints.
///
/// Access must be safe under concurrent verification; implementations backed
/// by shared mutable storage serialize internally.
pub trait AcceptedKeyStore: Send + Sync {
    /// The currently persisted fingerprints.
    fn get(&self) -> Vec<String>;

    /// Replace the persisted fingerprints.
    fn set(&self, keys: Vec<String>);
}

/// Whether `fingerprint` is in the persisted set.
#[must_use]
pub fn is_persisted(store: &dyn AcceptedKeyStore, fingerprint: &Fingerprint) -> bool {
    store.get().iter().any(|k| k == fingerprint.as_str())
}

/// Add `fingerprint` to the persisted set if not already present.
pub fn remember(store: &dyn AcceptedKeyStore, fingerprint: &Fingerprint) {
    let mut keys = store.get();
    if !keys.iter().any(|k| k == fingerprint.as_str()) {
        keys.push(fingerprint.as_str().to_string());
        store.set(keys);
    }
}

/// Remove `fingerprint` from the persisted set.
pub fn forget(store: &dyn AcceptedKeyStore, fingerprint: &Fingerprint) {
    let keys: Vec<String> = store
        .get()
        .into_iter()
        .filter(|k| k != fingerprint.as_str())
        .collect();
    store.set(keys);
}
