//! The `ripe-atlas_measurement` resource.
//!
//! Only ping measurements can be created. Every attribute that shapes the
//! measurement forces replacement, and in-place updates are rejected.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::Resource;
use crate::atlas::{
    AtlasApi, Measurement, MeasurementDefinition, MeasurementRequest, ProbeSetRequest,
};
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, NestedBlock, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "ripe-atlas_measurement";

/// Accepted values of `type`.
pub const MEASUREMENT_TYPES: &[&str] = &["ping", "dns", "http", "ntp", "sslcert", "traceroute"];

/// Accepted values of `probe_set.type`.
pub const PROBE_SET_TYPES: &[&str] = &["area", "country", "asn", "probes", "msm"];

const DEFAULT_INTERVAL: i64 = 300;
const DEFAULT_PACKETS: i64 = 3;
const DEFAULT_SIZE: i64 = 48;

/// IPv4 only.
const ADDRESS_FAMILY: u8 = 4;

/// Schema of `ripe-atlas_measurement`.
pub fn schema() -> Schema {
    let probe_set = Block::new()
        .with_attribute(
            "number",
            Attribute::required_int64()
                .with_description("Number of probes to select from this set")
                .between(1, 50),
        )
        .with_attribute(
            "type",
            Attribute::required_string()
                .with_description("How probes are selected")
                .one_of(PROBE_SET_TYPES),
        )
        .with_attribute(
            "value",
            Attribute::required_string()
                .with_description("Selector value: area name, country code, ASN, probe ids or measurement id"),
        );

    Schema::v0()
        .with_description("RIPE Atlas Measurement")
        .with_attribute(
            "id",
            Attribute::computed_int64().with_use_state_for_unknown(),
        )
        .with_attribute("description", Attribute::required_string())
        .with_attribute(
            "type",
            Attribute::required_string()
                .one_of(MEASUREMENT_TYPES)
                .with_force_new(),
        )
        .with_attribute("target", Attribute::required_string().with_force_new())
        .with_attribute(
            "interval",
            Attribute::optional_computed_int64()
                .with_default(json!(DEFAULT_INTERVAL))
                .between(30, 3600)
                .with_force_new(),
        )
        .with_attribute(
            "packets",
            Attribute::optional_computed_int64()
                .with_default(json!(DEFAULT_PACKETS))
                .between(1, 10)
                .with_force_new(),
        )
        .with_attribute(
            "size",
            Attribute::optional_computed_int64()
                .with_default(json!(DEFAULT_SIZE))
                .between(48, 1500)
                .with_force_new(),
        )
        .with_attribute(
            "last_updated",
            Attribute::computed_string().with_use_state_for_unknown(),
        )
        .with_block("probe_set", NestedBlock::list(probe_set).with_min_items(1))
}

/// State of a measurement resource.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementModel {
    pub id: Option<i64>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub target: Option<String>,
    pub interval: Option<i64>,
    pub packets: Option<i64>,
    pub size: Option<i64>,
    pub probe_set: Option<Vec<ProbeSetModel>>,
    pub last_updated: Option<String>,
}

/// One probe selection rule.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSetModel {
    pub number: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub value: Option<String>,
}

impl MeasurementModel {
    fn to_request(&self) -> MeasurementRequest {
        let definition = MeasurementDefinition {
            kind: self.kind.clone().unwrap_or_default(),
            af: ADDRESS_FAMILY,
            target: self.target.clone().unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
            packets: self.packets.unwrap_or(DEFAULT_PACKETS),
            interval: self.interval.unwrap_or(DEFAULT_INTERVAL),
            size: self.size.unwrap_or(DEFAULT_SIZE),
        };

        let probes = self
            .probe_set
            .iter()
            .flatten()
            .map(|set| ProbeSetRequest {
                requested: set.number.unwrap_or_default(),
                kind: set.kind.clone().unwrap_or_default(),
                value: set.value.clone().unwrap_or_default(),
            })
            .collect();

        MeasurementRequest {
            definitions: vec![definition],
            probes,
            is_oneoff: false,
        }
    }

    /// Overwrite every tracked field from the API's view of the measurement.
    fn refresh(&mut self, measurement: Measurement) {
        self.id = Some(measurement.id);
        self.description = Some(measurement.description);
        self.kind = Some(measurement.kind);
        self.target = Some(measurement.target);
        self.interval = Some(measurement.interval);
        self.packets = Some(measurement.packets);
        self.size = Some(measurement.size);
        self.probe_set = Some(
            measurement
                .participation_requests
                .into_iter()
                .map(|p| ProbeSetModel {
                    number: Some(p.requested),
                    kind: Some(p.kind),
                    value: Some(p.value),
                })
                .collect(),
        );
    }
}

/// RFC 850 timestamp, e.g. `Monday, 02-Jan-06 15:04:05 UTC`.
pub fn rfc850(at: DateTime<Utc>) -> String {
    at.format("%A, %d-%b-%y %H:%M:%S UTC").to_string()
}

/// The measurement resource.
pub struct MeasurementResource {
    client: Arc<dyn AtlasApi>,
}

impl MeasurementResource {
    /// Create the resource around a shared client.
    pub fn new(client: Arc<dyn AtlasApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resource for MeasurementResource {
    async fn create(&self, planned: Value) -> Result<Value, ProviderError> {
        let mut model: MeasurementModel = serde_json::from_value(planned)?;

        let kind = model.kind.clone().unwrap_or_default();
        if kind != "ping" {
            return Err(ProviderError::unsupported(
                "Type Error",
                format!("Measurement type {} not supported!", kind),
            ));
        }

        let request = model.to_request();
        info!(target_host = %request.definitions[0].target, probe_sets = request.probes.len(), "Creating RIPE Atlas measurement");
        let created = self
            .client
            .create_ping(&request)
            .await
            .map_err(|e| ProviderError::upstream("Unable to create ping measurement on RIPE Atlas", e))?;

        let id = created.measurements.first().copied().ok_or_else(|| {
            ProviderError::MissingIdentifier(
                "Error occurred while creating object. No ID retrieved!".to_string(),
            )
        })?;
        info!(id, "RIPE Atlas measurement created");

        model.id = Some(id);
        model.last_updated = Some(rfc850(Utc::now()));
        Ok(serde_json::to_value(model)?)
    }

    async fn read(&self, current: Value) -> Result<Value, ProviderError> {
        let mut model: MeasurementModel = serde_json::from_value(current.clone())?;
        let Some(id) = model.id else {
            debug!("Measurement has no id yet, nothing to read");
            return Ok(current);
        };

        let measurement = self
            .client
            .measurement(id)
            .await
            .map_err(|e| ProviderError::upstream("Unable to get measurement from RIPE Atlas", e))?;
        debug!(id, status = %measurement.status.name, "RIPE Atlas measurement found");

        model.refresh(measurement);
        Ok(serde_json::to_value(model)?)
    }

    async fn update(&self, _prior: Value, _planned: Value) -> Result<Value, ProviderError> {
        Err(ProviderError::unsupported(
            "Update not supported!",
            "Update is currently not supported!",
        ))
    }

    async fn delete(&self, current: Value) -> Result<(), ProviderError> {
        let model: MeasurementModel = serde_json::from_value(current)?;
        let id = model.id.ok_or_else(|| {
            ProviderError::MissingMeasurementId(
                "Cannot delete a measurement whose state has no id".to_string(),
            )
        })?;

        info!(id, "Deleting RIPE Atlas measurement");
        self.client
            .delete_measurement(id)
            .await
            .map_err(|e| ProviderError::upstream("Unable to delete measurement from RIPE Atlas", e))?;
        info!(id, "RIPE Atlas measurement deleted");
        Ok(())
    }

    async fn import(&self, id: &str) -> Result<Value, ProviderError> {
        let id: i64 = id.parse().map_err(|e| {
            ProviderError::InvalidImportId(format!(
                "Could not import item, unexpected error (ID should be an integer): {}",
                e
            ))
        })?;
        Ok(json!({ "id": id }))
    }
}
