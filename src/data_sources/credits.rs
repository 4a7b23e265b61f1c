//! The `ripe-atlas_credits` data source.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::atlas::{AtlasApi, Credits};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Data source type name.
pub const TYPE_NAME: &str = "ripe-atlas_credits";

/// Schema of `ripe-atlas_credits`.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("RIPE Atlas Credits")
        .with_attribute("current_balance", Attribute::computed_int64())
        .with_attribute("estimated_daily_income", Attribute::computed_int64())
        .with_attribute("estimated_daily_expenditure", Attribute::computed_int64())
        .with_attribute("estimated_daily_balance", Attribute::computed_int64())
        .with_attribute("estimated_runout_seconds", Attribute::computed_int64())
}

/// State of the credits data source.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditsModel {
    pub current_balance: i64,
    pub estimated_daily_income: i64,
    pub estimated_daily_expenditure: i64,
    pub estimated_daily_balance: i64,
    pub estimated_runout_seconds: i64,
}

impl From<Credits> for CreditsModel {
    fn from(credits: Credits) -> Self {
        Self {
            current_balance: credits.current_balance,
            estimated_daily_income: credits.estimated_daily_income,
            estimated_daily_expenditure: credits.estimated_daily_expenditure,
            estimated_daily_balance: credits.estimated_daily_balance,
            estimated_runout_seconds: credits.estimated_runout_seconds,
        }
    }
}

/// Reads the account's credit balance.
pub struct CreditsDataSource {
    client: Arc<dyn AtlasApi>,
}

impl CreditsDataSource {
    /// Create the data source around a shared client.
    pub fn new(client: Arc<dyn AtlasApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for CreditsDataSource {
    async fn read(&self, _config: Value) -> Result<Value, ProviderError> {
        let credits = self
            .client
            .credits()
            .await
            .map_err(|e| ProviderError::upstream("Unable to get credits from RIPE Atlas", e))?;
        debug!(current_balance = credits.current_balance, "RIPE Atlas credits");

        Ok(serde_json::to_value(CreditsModel::from(credits))?)
    }
}
