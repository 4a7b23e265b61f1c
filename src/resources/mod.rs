//! Managed resources.
//!
//! Each resource holds the shared [`AtlasApi`](crate::atlas::AtlasApi)
//! handle it was constructed with and works on JSON state documents.

pub mod measurement;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;

pub use measurement::MeasurementResource;

/// Lifecycle of a managed resource.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Create the remote object described by `planned` and return the new state.
    async fn create(&self, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh `current` from the remote object.
    async fn read(&self, current: Value) -> Result<Value, ProviderError>;

    /// Apply an in-place change.
    async fn update(&self, prior: Value, planned: Value) -> Result<Value, ProviderError>;

    /// Remove the remote object.
    async fn delete(&self, current: Value) -> Result<(), ProviderError>;

    /// Build a minimal state from an import identifier; a read completes it.
    async fn import(&self, id: &str) -> Result<Value, ProviderError>;
}
