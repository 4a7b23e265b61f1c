//! Read-only data sources.

pub mod credits;
pub mod measurement;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;

pub use credits::CreditsDataSource;
pub use measurement::MeasurementDataSource;

/// A read-only query against RIPE Atlas.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Run the query for `config` and return the resulting state.
    async fn read(&self, config: Value) -> Result<Value, ProviderError>;
}
