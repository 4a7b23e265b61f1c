//! HTTP implementation of [`AtlasApi`] over the RIPE Atlas v2 REST API.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::model::{ErrorEnvelope, Page};
use super::{
    AtlasApi, AtlasError, Credits, Measurement, MeasurementFilter, MeasurementIds,
    MeasurementRequest,
};

/// Public RIPE Atlas endpoint.
pub const DEFAULT_BASE_URL: &str = "https://atlas.ripe.net";

/// Settings needed to build an [`AtlasClient`].
#[derive(Clone)]
pub struct AtlasConfig {
    /// RIPE Atlas API key, sent as `Authorization: Key <api_key>`.
    pub api_key: String,
    /// Scheme and host of the API, without the `/api/v2` suffix.
    pub base_url: String,
}

impl AtlasConfig {
    /// Configuration for the public API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at another deployment.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// Keeps the key out of logs.
impl fmt::Debug for AtlasConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtlasConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// RIPE Atlas client backed by a pooled [`reqwest::Client`].
///
/// Cloning is cheap and clones share the connection pool.
#[derive(Debug, Clone)]
pub struct AtlasClient {
    http: reqwest::Client,
    base_url: String,
}

impl AtlasClient {
    /// Build a client that authenticates every request with `config.api_key`.
    pub fn new(config: AtlasConfig) -> Result<Self, AtlasError> {
        let mut auth = HeaderValue::from_str(&format!("Key {}", config.api_key))
            .map_err(|_| AtlasError::InvalidApiKey)?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v2/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, AtlasError> {
        debug!(method = "GET", url = %url, "RIPE Atlas request");
        let response = self.http.get(url).send().await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Turn a non-success response into [`AtlasError::Api`].
async fn check(response: Response) -> Result<Response, AtlasError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AtlasError::Api {
        status: status.as_u16(),
        detail: error_detail(status, &body),
    })
}

fn error_detail(status: StatusCode, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        if let Some(detail) = envelope.error.detail.or(envelope.error.title) {
            return detail;
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        body.to_string()
    }
}

#[async_trait]
impl AtlasApi for AtlasClient {
    async fn credits(&self) -> Result<Credits, AtlasError> {
        self.get_json(&self.url("credits/")).await
    }

    async fn measurements(
        &self,
        filter: &MeasurementFilter,
    ) -> Result<Vec<Measurement>, AtlasError> {
        let url = self.url("measurements/");
        debug!(method = "GET", url = %url, filter = ?filter, "RIPE Atlas request");
        let response = self.http.get(&url).query(filter).send().await?;
        let mut page: Page<Measurement> = check(response).await?.json().await?;

        let mut measurements = std::mem::take(&mut page.results);
        while let Some(next) = page.next.take() {
            page = self.get_json(&next).await?;
            measurements.append(&mut page.results);
        }

        Ok(measurements)
    }

    async fn measurement(&self, id: i64) -> Result<Measurement, AtlasError> {
        let url = self.url(&format!(
            "measurements/{}/?optional_fields=participation_requests",
            id
        ));
        self.get_json(&url).await
    }

    async fn create_ping(
        &self,
        request: &MeasurementRequest,
    ) -> Result<MeasurementIds, AtlasError> {
        let url = self.url("measurements/");
        debug!(method = "POST", url = %url, "RIPE Atlas request");
        let response = self.http.post(&url).json(request).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn delete_measurement(&self, id: i64) -> Result<(), AtlasError> {
        let url = self.url(&format!("measurements/{}/", id));
        debug!(method = "DELETE", url = %url, "RIPE Atlas request");
        let response = self.http.delete(&url).send().await?;
        check(response).await?;
        Ok(())
    }
}
