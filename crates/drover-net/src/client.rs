//! REST client for the management-console backend.
//!
//! [`BackendClient`] implements all three of the engine's boundary traits
//! over HTTP:
//!
//! - reference data: `GET {base}/reference/{kind}` with optional query
//!   parameters, answering a JSON array of options
//! - uniqueness: `GET {base}/unique/{kind}?value=...`, answering
//!   `{"exists": bool}` - idempotent and side-effect free on the server
//! - submission: `POST {base}{submit_path}` with the record JSON, answering
//!   the three-way envelope discriminated by `status`
//!
//! # Example
//!
//! ```no_run
//! use drover_net::BackendClient;
//!
//! # fn demo() -> drover_net::Result<()> {
//! let client = BackendClient::builder("https://farm.example.com/api")
//!     .bearer_auth("session-token")
//!     .submit_path("/animals")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use drover::lookup::{ChoiceOption, LookupError, OptionsProvider};
use drover::submit::{GatewayError, SubmitGateway, SubmitOutcome};
use drover::validate::{ProbeError, UniquenessProbe};
use futures_util::future::BoxFuture;
use http::StatusCode;

use crate::error::{NetworkError, Result};
use crate::payload::{OptionPayload, SubmitEnvelope, UniquePayload};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default submission path.
const DEFAULT_SUBMIT_PATH: &str = "/records";

// ============================================================================
// BackendClientBuilder
// ============================================================================

/// Builder for [`BackendClient`].
#[derive(Debug, Clone)]
pub struct BackendClientBuilder {
    base_url: String,
    bearer_token: Option<String>,
    timeout: Duration,
    submit_path: String,
}

impl BackendClientBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token: None,
            timeout: DEFAULT_TIMEOUT,
            submit_path: DEFAULT_SUBMIT_PATH.to_string(),
        }
    }

    /// Authenticate requests with a bearer token.
    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the path submissions are posted to (e.g. `/animals`).
    pub fn submit_path(mut self, path: impl Into<String>) -> Self {
        self.submit_path = path.into();
        self
    }

    /// Build the client.
    ///
    /// Validates the base URL and constructs the underlying HTTP client.
    pub fn build(self) -> Result<BackendClient> {
        let trimmed = self.base_url.trim_end_matches('/').to_string();
        url::Url::parse(&trimmed)?;

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| NetworkError::ClientBuild(e.to_string()))?;

        Ok(BackendClient {
            http,
            base_url: trimmed,
            bearer_token: self.bearer_token,
            submit_path: self.submit_path,
        })
    }
}

// ============================================================================
// BackendClient
// ============================================================================

/// HTTP implementation of the engine's boundary traits.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
    submit_path: String,
}

impl BackendClient {
    /// Start building a client for the given base URL.
    pub fn builder(base_url: impl Into<String>) -> BackendClientBuilder {
        BackendClientBuilder::new(base_url)
    }

    /// The normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The path submissions are posted to.
    pub fn submit_path(&self) -> &str {
        &self.submit_path
    }

    fn get(&self, url: String) -> reqwest::RequestBuilder {
        let mut request = self.http.get(url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        request
    }

    fn post(&self, url: String) -> reqwest::RequestBuilder {
        let mut request = self.http.post(url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        request
    }

    /// Fetch the selectable options of a lookup kind.
    ///
    /// An unknown kind (404) is an empty result set, not an error.
    pub async fn options(
        &self,
        kind: &str,
        params: &[(String, String)],
    ) -> Result<Vec<ChoiceOption>> {
        let url = format!("{}/reference/{}", self.base_url, kind);
        tracing::debug!(target: "drover_net", kind, %url, "fetching reference data");

        let response = self.get(url).query(params).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(status_error(status, response.text().await.ok()));
        }

        let payloads: Vec<OptionPayload> = response.json().await?;
        Ok(payloads.into_iter().map(Into::into).collect())
    }

    /// Check whether a candidate value already exists under a kind.
    pub async fn unique(&self, kind: &str, value: &str) -> Result<bool> {
        let url = format!("{}/unique/{}", self.base_url, kind);
        tracing::debug!(target: "drover_net", kind, %url, "checking uniqueness");

        let response = self
            .get(url)
            .query(&[("value", value)])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response.text().await.ok()));
        }

        let payload: UniquePayload = response.json().await?;
        Ok(payload.exists)
    }

    /// Post a finalized record and parse the three-way envelope.
    pub async fn submit_record(&self, payload: serde_json::Value) -> Result<SubmitOutcome> {
        let url = format!("{}{}", self.base_url, self.submit_path);
        tracing::info!(target: "drover_net", %url, "submitting record");

        let response = self.post(url).json(&payload).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, Some(body)));
        }

        let envelope: SubmitEnvelope = serde_json::from_str(&body)?;
        Ok(envelope.into())
    }
}

fn status_error(status: StatusCode, body: Option<String>) -> NetworkError {
    NetworkError::HttpStatus {
        status: status.as_u16(),
        message: body.filter(|b| !b.is_empty()),
    }
}

// ============================================================================
// Boundary trait implementations
// ============================================================================

impl OptionsProvider for BackendClient {
    fn fetch_options(
        &self,
        kind: &str,
        params: &[(String, String)],
    ) -> BoxFuture<'static, std::result::Result<Vec<ChoiceOption>, LookupError>> {
        let client = self.clone();
        let kind = kind.to_string();
        let params = params.to_vec();
        Box::pin(async move {
            client
                .options(&kind, &params)
                .await
                .map_err(|e| LookupError::Unavailable(e.to_string()))
        })
    }
}

impl UniquenessProbe for BackendClient {
    fn check_unique(
        &self,
        kind: &str,
        candidate: &str,
    ) -> BoxFuture<'static, std::result::Result<bool, ProbeError>> {
        let client = self.clone();
        let kind = kind.to_string();
        let candidate = candidate.to_string();
        Box::pin(async move {
            client
                .unique(&kind, &candidate)
                .await
                .map_err(|e| ProbeError::Unavailable(e.to_string()))
        })
    }
}

impl SubmitGateway for BackendClient {
    fn submit(
        &self,
        payload: serde_json::Value,
    ) -> BoxFuture<'static, std::result::Result<SubmitOutcome, GatewayError>> {
        let client = self.clone();
        Box::pin(async move {
            client
                .submit_record(payload)
                .await
                .map_err(|err| match err {
                    NetworkError::HttpStatus { status, message } => {
                        GatewayError::Status { status, message }
                    }
                    NetworkError::Json(e) => GatewayError::InvalidResponse(e.to_string()),
                    other => GatewayError::Transport(other.to_string()),
                })
        })
    }
}

/// Convenience conversion into the trait objects the wizard builder takes.
impl BackendClient {
    /// This client as an options provider.
    pub fn as_options_provider(&self) -> Arc<dyn OptionsProvider> {
        Arc::new(self.clone())
    }

    /// This client as a uniqueness probe.
    pub fn as_uniqueness_probe(&self) -> Arc<dyn UniquenessProbe> {
        Arc::new(self.clone())
    }

    /// This client as a submit gateway.
    pub fn as_submit_gateway(&self) -> Arc<dyn SubmitGateway> {
        Arc::new(self.clone())
    }
}
