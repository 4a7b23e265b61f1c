//! The `ripe-atlas_measurement` data source: the caller's own measurements.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::atlas::{AtlasApi, Measurement, MeasurementFilter};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};

/// Data source type name.
pub const TYPE_NAME: &str = "ripe-atlas_measurement";

/// Schema of the `ripe-atlas_measurement` data source.
pub fn schema() -> Schema {
    let measurement = AttributeType::object([
        ("id", AttributeType::Int64),
        ("description", AttributeType::String),
        ("type", AttributeType::String),
        ("target", AttributeType::String),
        ("interval", AttributeType::Int64),
        ("packets", AttributeType::Int64),
        ("size", AttributeType::Int64),
        ("status", AttributeType::String),
        (
            "probes",
            AttributeType::object([
                ("requested", AttributeType::Int64),
                ("scheduled", AttributeType::Int64),
            ]),
        ),
    ]);

    Schema::v0()
        .with_description("RIPE Atlas Measurement")
        .with_attribute(
            "hidden",
            Attribute::optional_bool().with_description("Also list hidden measurements"),
        )
        .with_attribute("measurements", Attribute::computed_list(measurement))
}

/// Configuration and state of the data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementListModel {
    /// Include hidden measurements; echoed back unchanged.
    pub hidden: Option<bool>,
    /// The matching measurements.
    #[serde(default)]
    pub measurements: Vec<MeasurementSummary>,
}

/// One listed measurement.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementSummary {
    pub id: i64,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
    pub interval: i64,
    pub packets: i64,
    pub size: i64,
    /// Status name, e.g. `Ongoing`.
    pub status: String,
    pub probes: ProbeCount,
}

/// Requested and scheduled probe counts.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeCount {
    pub requested: i64,
    pub scheduled: i64,
}

impl From<Measurement> for MeasurementSummary {
    fn from(m: Measurement) -> Self {
        Self {
            id: m.id,
            description: m.description,
            kind: m.kind,
            target: m.target,
            interval: m.interval,
            packets: m.packets,
            size: m.size,
            status: m.status.name,
            probes: ProbeCount {
                requested: m.probes_requested,
                scheduled: m.probes_scheduled,
            },
        }
    }
}

/// The only input of the data source. Other keys, such as a `measurements`
/// echoed back as `null`, are ignored.
#[derive(Debug, Default, Deserialize)]
struct ListConfig {
    #[serde(default)]
    hidden: Option<bool>,
}

/// Listing filter: always the caller's own measurements, hidden ones on request.
pub fn filter(hidden: Option<bool>) -> MeasurementFilter {
    let mut filter = MeasurementFilter::new();
    filter.insert("mine".to_string(), "true".to_string());
    if hidden == Some(true) {
        filter.insert("hidden".to_string(), "true".to_string());
    }
    filter
}

/// Lists the caller's measurements.
pub struct MeasurementDataSource {
    client: Arc<dyn AtlasApi>,
}

impl MeasurementDataSource {
    /// Create the data source around a shared client.
    pub fn new(client: Arc<dyn AtlasApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for MeasurementDataSource {
    async fn read(&self, config: Value) -> Result<Value, ProviderError> {
        let hidden = match config {
            Value::Null => None,
            config => serde_json::from_value::<ListConfig>(config)?.hidden,
        };

        let measurements = self
            .client
            .measurements(&filter(hidden))
            .await
            .map_err(|e| ProviderError::upstream("Unable to get measurements from RIPE Atlas", e))?;
        debug!(count = measurements.len(), "RIPE Atlas measurements listed");

        let state = MeasurementListModel {
            hidden,
            measurements: measurements.into_iter().map(Into::into).collect(),
        };
        Ok(serde_json::to_value(state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::MeasurementStatus;
    use crate::testing::FakeAtlas;
    use crate::validation::validate;
    use serde_json::json;

    fn measurement(id: i64, status: &str) -> Measurement {
        Measurement {
            id,
            description: format!("measurement {}", id),
            kind: "ping".to_string(),
            target: "example.net".to_string(),
            interval: 300,
            packets: 3,
            size: 48,
            status: MeasurementStatus {
                id: 2,
                name: status.to_string(),
            },
            probes_requested: 10,
            probes_scheduled: 8,
            participation_requests: vec![],
        }
    }

    #[test]
    fn test_filter() {
        assert_eq!(filter(None).len(), 1);
        assert_eq!(filter(None)["mine"], "true");
        assert!(!filter(Some(false)).contains_key("hidden"));
        assert_eq!(filter(Some(true))["hidden"], "true");
    }

    #[tokio::test]
    async fn test_read_maps_measurements() {
        let fake = FakeAtlas::new()
            .with_measurement(measurement(1, "Ongoing"))
            .with_measurement(measurement(2, "Stopped"));

        let state = MeasurementDataSource::new(fake.client())
            .read(json!({"hidden": null}))
            .await
            .unwrap();

        assert_eq!(state["hidden"], Value::Null);
        assert_eq!(state["measurements"].as_array().unwrap().len(), 2);
        assert_eq!(
            state["measurements"][0],
            json!({
                "id": 1,
                "description": "measurement 1",
                "type": "ping",
                "target": "example.net",
                "interval": 300,
                "packets": 3,
                "size": 48,
                "status": "Ongoing",
                "probes": {"requested": 10, "scheduled": 8}
            })
        );
        assert_eq!(state["measurements"][1]["status"], "Stopped");
        assert_eq!(fake.filters(), vec![filter(None)]);
    }

    #[tokio::test]
    async fn test_hidden_is_forwarded_and_echoed() {
        let fake = FakeAtlas::new();
        let state = MeasurementDataSource::new(fake.client())
            .read(json!({"hidden": true}))
            .await
            .unwrap();

        assert_eq!(state["hidden"], true);
        assert_eq!(state["measurements"], json!([]));
        assert_eq!(fake.filters()[0].get("hidden").map(String::as_str), Some("true"));
    }

    #[tokio::test]
    async fn test_read_ignores_null_measurements() {
        let fake = FakeAtlas::new().with_measurement(measurement(3, "Ongoing"));
        let state = MeasurementDataSource::new(fake.client())
            .read(json!({"hidden": true, "measurements": null}))
            .await
            .unwrap();

        assert_eq!(state["hidden"], true);
        assert_eq!(state["measurements"][0]["id"], 3);
        assert_eq!(fake.filters()[0]["hidden"], "true");
    }

    #[tokio::test]
    async fn test_read_rejects_mistyped_hidden() {
        let fake = FakeAtlas::new();
        let err = MeasurementDataSource::new(fake.client())
            .read(json!({"hidden": "yes"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)));
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn test_read_failure() {
        let fake = FakeAtlas::new();
        fake.fail_with(500, "Internal Server Error");

        let err = MeasurementDataSource::new(fake.client())
            .read(Value::Null)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_diagnostic().summary,
            "Unable to get measurements from RIPE Atlas"
        );
    }

    #[test]
    fn test_schema_validation() {
        let schema = schema();
        assert!(validate(&schema, &json!({"hidden": true})).is_empty());
        assert_eq!(validate(&schema, &json!({"hidden": "yes"})).len(), 1);
    }
}
