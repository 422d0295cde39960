//! HTTP transport seam.
//!
//! The device-flow client only needs form-encoded POSTs that surface the
//! body even on non-2xx responses, so that is the whole trait. The default
//! implementation wraps reqwest with the trust engine's rustls config
//! spliced in; tests supply scripted transports.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::FlowError;
use crate::verifier::TrustEngine;

/// One HTTP response, body included regardless of status.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Form-encoded POST transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `params` form-encoded to `path` (relative to the configured base
    /// URL) and return the response, whatever its status.
    async fn post_form(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<HttpResponse, FlowError>;
}

/// reqwest-backed transport with TLS verification delegated to a
/// [`TrustEngine`].
pub struct HttpsTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpsTransport {
    /// Build a transport for `base_url`.
    ///
    /// When an engine is given, its verifier replaces the platform
    /// certificate checks and hostname identification; without one the
    /// platform defaults apply.
    pub fn new(base_url: &str, engine: Option<&Arc<TrustEngine>>) -> Result<Self, FlowError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15));
        if let Some(engine) = engine {
            builder = builder.use_preconfigured_tls(engine.client_config());
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: builder.build()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpsTransport {
    async fn post_form(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<HttpResponse, FlowError> {
        let url = self.url(path);
        info!(%url, "executing request");

        let response = self.client.post(&url).form(params).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// HTTP capability pre-authenticated with a bearer token.
///
/// Handed to the token callback on success; every request built through it
/// carries `Authorization: <token_type> <access_token>` and, when a trust
/// engine was configured, verifies the server the same way the flow did.
#[derive(Clone)]
pub struct AuthorizedHttp {
    client: reqwest::Client,
    authorization: String,
}

impl AuthorizedHttp {
    pub(crate) fn new(
        token: &keyfob_core::BearerToken,
        engine: Option<&Arc<TrustEngine>>,
    ) -> Result<Self, FlowError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15));
        if let Some(engine) = engine {
            builder = builder.use_preconfigured_tls(engine.client_config());
        }
        Ok(Self {
            client: builder.build()?,
            authorization: token.authorization_header(),
        })
    }

    /// The `Authorization` header value carried on every request.
    #[must_use]
    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    /// Start building an authenticated request.
    pub fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, self.authorization.as_str())
    }

    /// Start building an authenticated GET request.
    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.request(reqwest::Method::GET, url)
    }
}

impl std::fmt::Debug for AuthorizedHttp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Deliberately omits the authorization value.
        f.debug_struct("AuthorizedHttp").finish_non_exhaustive()
    }
}
