//! Wire shapes of the RIPE Atlas v2 API.
//!
//! Field names mirror the API's JSON.

#![allow(missing_docs)]

use serde::{Deserialize, Deserializer, Serialize};

/// Account credit balance (`GET /api/v2/credits/`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credits {
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_balance: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub estimated_daily_income: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub estimated_daily_expenditure: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub estimated_daily_balance: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub estimated_runout_seconds: i64,
}

/// Lifecycle status of a measurement ("Specified", "Ongoing", "Stopped", ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// A probe selection as recorded on an existing measurement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub requested: i64,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
}

/// A measurement as returned by the API.
///
/// Fields the API reports as `null` (for instance `size` on a traceroute)
/// decode to their zero value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub target: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub interval: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub packets: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: MeasurementStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub probes_requested: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub probes_scheduled: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub participation_requests: Vec<ParticipationRequest>,
}

/// One measurement definition inside a creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeasurementDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub af: u8,
    pub target: String,
    pub description: String,
    pub packets: i64,
    pub interval: i64,
    pub size: i64,
}

/// A probe selection rule inside a creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeSetRequest {
    pub requested: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Body of `POST /api/v2/measurements/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeasurementRequest {
    pub definitions: Vec<MeasurementDefinition>,
    pub probes: Vec<ProbeSetRequest>,
    pub is_oneoff: bool,
}

/// Response of a successful measurement creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementIds {
    #[serde(default, deserialize_with = "null_as_default")]
    pub measurements: Vec<i64>,
}

/// One page of a paginated listing.
#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// The API's error envelope: `{"error": {"status": 400, "title": ..., "detail": ...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_credits_null_runout() {
        let credits: Credits = serde_json::from_value(json!({
            "current_balance": 120000,
            "estimated_daily_income": 21600,
            "estimated_daily_expenditure": 4320,
            "estimated_daily_balance": 17280,
            "estimated_runout_seconds": null,
            "calculation_time": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(credits.current_balance, 120000);
        assert_eq!(credits.estimated_daily_balance, 17280);
        assert_eq!(credits.estimated_runout_seconds, 0);
    }

    #[test]
    fn test_measurement_decoding() {
        let measurement: Measurement = serde_json::from_value(json!({
            "id": 1001,
            "description": "Ping to example.net",
            "type": "ping",
            "target": "example.net",
            "interval": 300,
            "packets": 3,
            "size": 48,
            "af": 4,
            "status": {"id": 2, "name": "Ongoing", "when": null},
            "probes_requested": 5,
            "probes_scheduled": 4,
            "participation_requests": [
                {"requested": 5, "type": "country", "value": "NL", "action": "add"}
            ]
        }))
        .unwrap();

        assert_eq!(measurement.kind, "ping");
        assert_eq!(measurement.status.name, "Ongoing");
        assert_eq!(measurement.probes_scheduled, 4);
        assert_eq!(
            measurement.participation_requests,
            vec![ParticipationRequest {
                requested: 5,
                kind: "country".to_string(),
                value: "NL".to_string(),
            }]
        );
    }

    #[test]
    fn test_measurement_nulls_decode_to_zero_values() {
        let measurement: Measurement = serde_json::from_value(json!({
            "id": 7,
            "description": null,
            "type": "traceroute",
            "target": "example.org",
            "interval": 900,
            "packets": null,
            "size": null,
            "status": {"id": 4, "name": "Stopped"},
            "probes_requested": null,
            "probes_scheduled": null
        }))
        .unwrap();

        assert_eq!(measurement.description, "");
        assert_eq!(measurement.packets, 0);
        assert_eq!(measurement.size, 0);
        assert!(measurement.participation_requests.is_empty());
    }

    #[test]
    fn test_request_wire_shape() {
        let request = MeasurementRequest {
            definitions: vec![MeasurementDefinition {
                kind: "ping".to_string(),
                af: 4,
                target: "example.net".to_string(),
                description: "d".to_string(),
                packets: 3,
                interval: 300,
                size: 48,
            }],
            probes: vec![ProbeSetRequest {
                requested: 1,
                kind: "probes".to_string(),
                value: "123".to_string(),
            }],
            is_oneoff: false,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["definitions"][0]["type"], "ping");
        assert_eq!(value["definitions"][0]["af"], 4);
        assert_eq!(value["probes"][0]["type"], "probes");
        assert_eq!(value["probes"][0]["requested"], 1);
        assert_eq!(value["is_oneoff"], false);
    }

    #[test]
    fn test_page_decoding() {
        let page: Page<Measurement> = serde_json::from_value(json!({
            "count": 2,
            "next": "https://atlas.ripe.net/api/v2/measurements/?mine=true&page=2",
            "previous": null,
            "results": [{"id": 1, "type": "ping"}]
        }))
        .unwrap();

        assert!(page.next.is_some());
        assert_eq!(page.results.len(), 1);
    }
}
