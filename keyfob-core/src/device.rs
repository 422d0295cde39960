//! Device Authorization Grant wire types.
//!
//! Field names follow the OAuth2 device flow as spoken over the wire:
//! form-urlencoded requests, JSON responses. The polling loop in
//! `keyfob-client` drives these types; classification of a token response
//! into a [`PollState`] lives here so it can be tested without a transport.

use serde::{Deserialize, Serialize};

/// Poll interval used when the server omits or zeroes `interval`, in seconds.
pub const DEFAULT_POLL_INTERVAL: u64 = 5;

/// How much a `slow_down` response widens the poll interval, in seconds.
pub const SLOW_DOWN_STEP: u64 = 5;

/// Response from the device-authorization endpoint.
///
/// Valid for `expires_in` seconds from issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCode {
    /// The device verification code, polled against the token endpoint.
    pub device_code: String,
    /// User-facing code to enter on the verification page.
    pub user_code: String,
    /// URL for the user to visit.
    pub verification_uri: String,
    /// Complete URL including the user code.
    pub verification_uri_complete: String,
    /// Seconds until the device code expires.
    pub expires_in: u64,
    /// Requested seconds between polling attempts. Zero means unspecified.
    #[serde(default)]
    pub interval: u64,
}

impl DeviceCode {
    /// The initial poll interval in seconds, defaulting when unspecified.
    #[must_use]
    pub fn poll_interval(&self) -> u64 {
        if self.interval == 0 {
            DEFAULT_POLL_INTERVAL
        } else {
            self.interval
        }
    }
}

/// Response from the token endpoint, one per poll.
///
/// `error` is `None` on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearerToken {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl BearerToken {
    /// Classify this response for the polling state machine.
    #[must_use]
    pub fn poll_state(&self) -> PollState {
        match self.error.as_deref() {
            None => PollState::Success,
            Some("authorization_denied") => PollState::Denied,
            Some("expired_token") => PollState::Expired,
            Some("authorization_pending") => PollState::Pending,
            Some("slow_down") => PollState::SlowDown,
            Some(_) => PollState::OtherError,
        }
    }

    /// The `Authorization` header value for requests bearing this token,
    /// `"<token_type> <access_token>"`.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!(
            "{} {}",
            self.token_type,
            self.access_token.as_deref().unwrap_or_default()
        )
    }
}

/// Classification of a token-endpoint response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No error; the token is ready.
    Success,
    /// The user denied the authorization request.
    Denied,
    /// The device code expired server-side.
    Expired,
    /// The user has not completed authorization yet; poll again.
    Pending,
    /// The server asked for a wider poll interval.
    SlowDown,
    /// Any other protocol error; terminal.
    OtherError,
}
