//! TOFU certificate trust engine and OAuth2 device-flow client.
//!
//! `keyfob-client` wires the pure logic of `keyfob-core` into the world:
//!
//! - [`TrustEngine`] is a rustls certificate verifier layering validity and
//!   hostname checks with trust-on-first-use, escalating failures to a
//!   [`prompt::PromptBackend`] through the [`prompt::PromptCoordinator`].
//! - [`DeviceAuthClient`] drives the OAuth2 Device Authorization Grant over
//!   a transport whose TLS verification hooks are the engine.
//! - [`FileKeyStore`] / [`MemoryKeyStore`] persist accepted fingerprints;
//!   [`console`] is a ready-made terminal frontend.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use keyfob_client::{console, ConsolePrompt, DeviceAuthClient, FileKeyStore, TrustEngine};
//!
//! let store = Arc::new(FileKeyStore::open("myapp")?);
//! let engine = TrustEngine::new(true, store, Arc::new(ConsolePrompt::new()));
//!
//! let client = DeviceAuthClient::builder()
//!     .base_url("https://id.example.com/app")
//!     .scope("openid")
//!     .trust_engine(engine)
//!     .on_device_code(|code| console::print_device_code(code))
//!     .on_token(|_code, token, _http| println!("token: {:?}", token.access_token))
//!     .build()?;
//!
//! client.authorize().await?;
//! ```

pub mod cancel;
pub mod console;
pub mod error;
pub mod flow;
pub mod http;
pub mod prompt;
pub mod store;
pub mod verifier;

pub use cancel::{CancelCoordinator, CancelSignal};
pub use console::ConsolePrompt;
pub use error::FlowError;
pub use flow::DeviceAuthClient;
pub use http::{AuthorizedHttp, HttpResponse, HttpsTransport, Transport};
pub use prompt::{CertPrompt, PromptBackend, PromptCategory, PromptCoordinator};
pub use store::{FileKeyStore, MemoryKeyStore, StoreError};
pub use verifier::{fingerprint_from_cert_der, TrustEngine};

pub use keyfob_core::{
    AcceptedKeyStore, BearerToken, DeviceCode, Fingerprint, PollState, PromptChoice, TrustDecision,
};
