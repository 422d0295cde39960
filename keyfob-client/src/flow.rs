//! The device-flow polling state machine.
//!
//! Implements the OAuth2 Device Authorization Grant against the service's
//! `oauth2/device` and `oauth2/token` endpoints: request a device code,
//! hand it to the caller exactly once, then poll the token endpoint until
//! success, refusal, expiry of the device code, or cancellation.
//!
//! The loop performs real delays between attempts; run [`DeviceAuthClient::authorize`]
//! on a dedicated worker task so it never stalls a UI or request-handling
//! thread.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use keyfob_core::device::{BearerToken, DeviceCode, PollState, SLOW_DOWN_STEP};

use crate::cancel::CancelSignal;
use crate::error::FlowError;
use crate::http::{AuthorizedHttp, HttpResponse, HttpsTransport, Transport};
use crate::verifier::TrustEngine;

const DEVICE_PATH: &str = "oauth2/device";
const TOKEN_PATH: &str = "oauth2/token";
const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Called exactly once with the issued device code, before any polling.
pub type DeviceCodeHandler = Box<dyn Fn(&DeviceCode) + Send>;

/// Called exactly once with the final token and a pre-authenticated HTTP
/// capability.
pub type TokenHandler = Box<dyn FnOnce(&DeviceCode, &BearerToken, AuthorizedHttp) + Send>;

/// Builder for [`DeviceAuthClient`].
#[derive(Default)]
pub struct Builder {
    base_url: Option<String>,
    scope: Option<String>,
    engine: Option<Arc<TrustEngine>>,
    transport: Option<Arc<dyn Transport>>,
    on_device_code: Option<DeviceCodeHandler>,
    on_token: Option<TokenHandler>,
    cancel: Option<CancelSignal>,
}

impl Builder {
    /// Base URL of the authorization server.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Scope to request.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Trust engine verifying the server's certificates. Without one the
    /// platform's default verification applies.
    pub fn trust_engine(mut self, engine: Arc<TrustEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Replace the transport. The default posts over HTTPS via the trust
    /// engine's TLS config.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Callback for the issued device code.
    pub fn on_device_code(mut self, handler: impl Fn(&DeviceCode) + Send + 'static) -> Self {
        self.on_device_code = Some(Box::new(handler));
        self
    }

    /// Callback for the final token.
    pub fn on_token(
        mut self,
        handler: impl FnOnce(&DeviceCode, &BearerToken, AuthorizedHttp) + Send + 'static,
    ) -> Self {
        self.on_token = Some(Box::new(handler));
        self
    }

    /// Cancellation signal aborting sleeps and in-flight requests.
    pub fn cancel_signal(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the scope is missing, or when no
    /// base URL was given and no transport override supplied.
    pub fn build(self) -> Result<DeviceAuthClient, FlowError> {
        let scope = self.scope.ok_or(FlowError::Config("no scope provided"))?;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let base_url = self
                    .base_url
                    .ok_or(FlowError::Config("no base URL provided"))?;
                Arc::new(HttpsTransport::new(&base_url, self.engine.as_ref())?)
            }
        };
        Ok(DeviceAuthClient {
            scope,
            transport,
            engine: self.engine,
            on_device_code: self.on_device_code,
            on_token: self.on_token,
            cancel: self.cancel,
        })
    }
}

/// OAuth2 Device Authorization Grant client.
pub struct DeviceAuthClient {
    scope: String,
    transport: Arc<dyn Transport>,
    engine: Option<Arc<TrustEngine>>,
    on_device_code: Option<DeviceCodeHandler>,
    on_token: Option<TokenHandler>,
    cancel: Option<CancelSignal>,
}

impl std::fmt::Debug for DeviceAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceAuthClient")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl DeviceAuthClient {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Run the device authorization flow to completion or failure.
    ///
    /// Requests a device code, hands it to the device-code callback, then
    /// polls the token endpoint. On success the token callback receives the
    /// token and an HTTP capability pre-authenticated with
    /// `"<token_type> <access_token>"`.
    pub async fn authorize(mut self) -> Result<(), FlowError> {
        let on_device_code = self
            .on_device_code
            .take()
            .ok_or(FlowError::Config("no device code handler"))?;
        let on_token = self
            .on_token
            .take()
            .ok_or(FlowError::Config("no token handler"))?;

        let response = self.post(DEVICE_PATH, &[("scope", &self.scope)]).await?;
        let device = decode_device(response)?;

        let issued = Instant::now();
        let deadline = issued + Duration::from_secs(device.expires_in);
        let mut interval = Duration::from_secs(device.poll_interval());

        on_device_code(&device);
        info!(device_code = %device.device_code, "awaiting device authorization");

        loop {
            if Instant::now() >= deadline {
                return Err(FlowError::Timeout);
            }

            let response = self
                .post(
                    TOKEN_PATH,
                    &[
                        ("grant_type", DEVICE_CODE_GRANT),
                        ("device_code", &device.device_code),
                    ],
                )
                .await?;
            let status = response.status;
            let token = decode_token(response)?;

            let state = token.poll_state();
            debug!(?state, "token poll");
            match state {
                PollState::Success => {
                    let http = AuthorizedHttp::new(&token, self.engine.as_ref())?;
                    on_token(&device, &token, http);
                    return Ok(());
                }
                PollState::Denied => return Err(FlowError::Denied),
                PollState::Expired => return Err(FlowError::Expired),
                PollState::Pending => self.sleep(interval).await?,
                PollState::SlowDown => {
                    // Widen first so the server's request takes effect for
                    // this wait as well; the interval only ever grows.
                    interval += Duration::from_secs(SLOW_DOWN_STEP);
                    self.sleep(interval).await?;
                }
                PollState::OtherError => {
                    return Err(FlowError::Response {
                        error: token.error.unwrap_or_default(),
                        description: token.error_description.unwrap_or_default(),
                        status,
                    })
                }
            }
        }
    }

    async fn post(&self, path: &str, params: &[(&str, &str)]) -> Result<HttpResponse, FlowError> {
        let request = self.transport.post_form(path, params);
        match &self.cancel {
            Some(signal) => tokio::select! {
                response = request => response,
                _ = signal.recv() => Err(FlowError::Cancelled),
            },
            None => request.await,
        }
    }

    async fn sleep(&self, duration: Duration) -> Result<(), FlowError> {
        match &self.cancel {
            Some(signal) => tokio::select! {
                _ = tokio::time::sleep(duration) => Ok(()),
                _ = signal.recv() => Err(FlowError::Cancelled),
            },
            None => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
        }
    }
}

/// Decode a device-authorization response.
///
/// A response carrying a decodable `device_code` wins whatever the status;
/// anything else surfaces as a structured or transport error.
fn decode_device(response: HttpResponse) -> Result<DeviceCode, FlowError> {
    if let Ok(device) = serde_json::from_str::<DeviceCode>(&response.body) {
        if !device.device_code.is_empty() {
            return Ok(device);
        }
    }
    Err(response_error(response))
}

/// Decode a token-endpoint response. Servers report poll progress in the
/// body's `error` field, sometimes with non-2xx statuses, so classification
/// runs on any decodable body.
fn decode_token(response: HttpResponse) -> Result<BearerToken, FlowError> {
    match serde_json::from_str::<BearerToken>(&response.body) {
        Ok(token) => Ok(token),
        Err(_) => Err(response_error(response)),
    }
}

/// Map an undecodable response onto an error: structured when the body is a
/// JSON error object, generic transport failure otherwise.
fn response_error(response: HttpResponse) -> FlowError {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&response.body) {
        if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
            return FlowError::Response {
                error: error.to_string(),
                description: value
                    .get("error_description")
                    .and_then(|d| d.as_str())
                    .unwrap_or_default()
                    .to_string(),
                status: response.status,
            };
        }
    }
    FlowError::Transport {
        status: response.status,
        body: response.body,
    }
}
