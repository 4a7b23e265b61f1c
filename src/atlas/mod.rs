//! RIPE Atlas API collaborator.
//!
//! [`AtlasApi`] is the contract every resource and data source is written
//! against. [`AtlasClient`] implements it over the public v2 REST API; tests
//! substitute [`crate::testing::FakeAtlas`].

mod client;
mod model;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

pub use client::{AtlasClient, AtlasConfig, DEFAULT_BASE_URL};
pub use model::{
    Credits, Measurement, MeasurementDefinition, MeasurementIds, MeasurementRequest,
    MeasurementStatus, ParticipationRequest, ProbeSetRequest,
};

/// Query parameters for measurement listing (`mine`, `hidden`, ...).
pub type MeasurementFilter = BTreeMap<String, String>;

/// Errors returned by the RIPE Atlas API.
#[derive(Debug, Error)]
pub enum AtlasError {
    /// The request never produced a usable response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("RIPE Atlas API returned {status}: {detail}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error detail from the response body.
        detail: String,
    },

    /// The API key cannot be carried in an HTTP header.
    #[error("API key contains characters that are not allowed in an HTTP header")]
    InvalidApiKey,
}

/// Operations the provider needs from RIPE Atlas.
#[async_trait]
pub trait AtlasApi: Send + Sync {
    /// Fetch the account's credit balance.
    async fn credits(&self) -> Result<Credits, AtlasError>;

    /// List measurements matching `filter`, across all result pages.
    async fn measurements(&self, filter: &MeasurementFilter)
        -> Result<Vec<Measurement>, AtlasError>;

    /// Fetch one measurement, including its participation requests.
    async fn measurement(&self, id: i64) -> Result<Measurement, AtlasError>;

    /// Schedule a ping measurement and return the new measurement ids.
    async fn create_ping(&self, request: &MeasurementRequest)
        -> Result<MeasurementIds, AtlasError>;

    /// Stop and delete a measurement.
    async fn delete_measurement(&self, id: i64) -> Result<(), AtlasError>;
}
