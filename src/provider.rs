//! The `ripe-atlas` provider.
//!
//! Configure builds one [`AtlasApi`] client and hands it to every resource
//! and data source; the other calls dispatch by type name.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::atlas::{AtlasApi, AtlasClient, AtlasConfig, AtlasError};
use crate::data_sources::{self, CreditsDataSource, DataSource, MeasurementDataSource};
use crate::error::ProviderError;
use crate::resources::{self, MeasurementResource, Resource};
use crate::schema::{Attribute, Diagnostic, ProviderSchema, Schema};
use crate::server::ProviderService;
use crate::types::ImportedResource;

/// Provider type name.
pub const TYPE_NAME: &str = "ripe-atlas";

/// Environment variable consulted when `api_key` is not configured.
pub const API_KEY_ENV: &str = "RIPE_ATLAS_API_KEY";

/// Provider configuration block.
#[derive(Default, Deserialize)]
pub struct ProviderConfig {
    /// RIPE Atlas API key.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ProviderConfig {
    fn from_value(config: Value) -> Result<Self, serde_json::Error> {
        match config {
            Value::Null => Ok(Self::default()),
            config => serde_json::from_value(config),
        }
    }
}

/// Schema of the provider configuration block.
pub fn config_schema() -> Schema {
    Schema::v0().with_attribute(
        "api_key",
        Attribute::required_string()
            .with_description("RIPE Atlas API Key")
            .sensitive(),
    )
}

/// Pick the API key: a configured value wins over the environment.
///
/// An empty result is reported as a diagnostic on `api_key`.
pub fn resolve_api_key(configured: Option<&str>, env: Option<String>) -> Result<String, Diagnostic> {
    let key = match configured {
        Some(key) => key.to_string(),
        None => env.unwrap_or_default(),
    };

    if key.is_empty() {
        return Err(Diagnostic::error("Missing RIPE Atlas API Key")
            .with_detail(format!(
                "The provider cannot create the RIPE Atlas API client as there is a missing or empty \
                 value for the RIPE Atlas API Key. Set the api_key value in the configuration or use \
                 the {} environment variable. If either is already set, ensure the value is not empty.",
                API_KEY_ENV
            ))
            .with_attribute("api_key"));
    }
    Ok(key)
}

fn env_api_key() -> Option<String> {
    std::env::var(API_KEY_ENV).ok()
}

type ClientFactory = dyn Fn(AtlasConfig) -> Result<Arc<dyn AtlasApi>, AtlasError> + Send + Sync;

/// Resources and data sources built around one client.
struct Registry {
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSource>>,
}

impl Registry {
    fn new(client: Arc<dyn AtlasApi>) -> Self {
        let mut resources: BTreeMap<&'static str, Box<dyn Resource>> = BTreeMap::new();
        resources.insert(
            resources::measurement::TYPE_NAME,
            Box::new(MeasurementResource::new(Arc::clone(&client))),
        );

        let mut data_sources: BTreeMap<&'static str, Box<dyn DataSource>> = BTreeMap::new();
        data_sources.insert(
            data_sources::credits::TYPE_NAME,
            Box::new(CreditsDataSource::new(Arc::clone(&client))),
        );
        data_sources.insert(
            data_sources::measurement::TYPE_NAME,
            Box::new(MeasurementDataSource::new(client)),
        );

        Self {
            resources,
            data_sources,
        }
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .get(resource_type)
            .map(Box::as_ref)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&dyn DataSource, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .map(Box::as_ref)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

/// The RIPE Atlas provider.
pub struct RipeAtlasProvider {
    client_factory: Box<ClientFactory>,
    registry: RwLock<Option<Arc<Registry>>>,
}

impl RipeAtlasProvider {
    /// A provider that talks to the public RIPE Atlas API.
    pub fn new() -> Self {
        Self::with_client_factory(|config| {
            let client: Arc<dyn AtlasApi> = Arc::new(AtlasClient::new(config)?);
            Ok(client)
        })
    }

    /// A provider whose client is built by `factory` at configure time.
    pub fn with_client_factory<F>(factory: F) -> Self
    where
        F: Fn(AtlasConfig) -> Result<Arc<dyn AtlasApi>, AtlasError> + Send + Sync + 'static,
    {
        Self {
            client_factory: Box::new(factory),
            registry: RwLock::new(None),
        }
    }

    /// Whether Configure has succeeded.
    pub fn is_configured(&self) -> bool {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn registry(&self) -> Result<Arc<Registry>, ProviderError> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ProviderError::Configuration("provider is not configured".to_string()))
    }
}

impl Default for RipeAtlasProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderService for RipeAtlasProvider {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(config_schema())
            .with_resource(
                resources::measurement::TYPE_NAME,
                resources::measurement::schema(),
            )
            .with_data_source(
                data_sources::credits::TYPE_NAME,
                data_sources::credits::schema(),
            )
            .with_data_source(
                data_sources::measurement::TYPE_NAME,
                data_sources::measurement::schema(),
            )
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = match ProviderConfig::from_value(config) {
            Ok(config) => config,
            Err(e) => {
                return Ok(vec![Diagnostic::error("Invalid provider configuration")
                    .with_detail(e.to_string())
                    .with_attribute("api_key")])
            },
        };

        Ok(resolve_api_key(config.api_key.as_deref(), env_api_key())
            .err()
            .into_iter()
            .collect())
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = ProviderConfig::from_value(config)?;

        let api_key = match resolve_api_key(config.api_key.as_deref(), env_api_key()) {
            Ok(key) => key,
            Err(diagnostic) => return Ok(vec![diagnostic]),
        };

        let client = match (self.client_factory)(AtlasConfig::new(api_key)) {
            Ok(client) => client,
            Err(e) => {
                return Ok(vec![Diagnostic::error("Unable to Create RIPE Atlas API Client")
                    .with_detail(format!(
                        "An unexpected error occurred when creating the RIPE Atlas API client.\n\n\
                         RIPE Atlas Client Error: {}",
                        e
                    ))])
            },
        };

        let registry = Arc::new(Registry::new(client));
        *self.registry.write().unwrap_or_else(PoisonError::into_inner) = Some(registry);
        info!("RIPE Atlas provider configured");
        Ok(vec![])
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        debug!("RIPE Atlas client released");
        Ok(())
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let registry = self.registry()?;
        registry.resource(resource_type)?.create(planned_state).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let registry = self.registry()?;
        registry.resource(resource_type)?.read(current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let registry = self.registry()?;
        registry
            .resource(resource_type)?
            .update(prior_state, planned_state)
            .await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let registry = self.registry()?;
        registry.resource(resource_type)?.delete(current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let registry = self.registry()?;
        let state = registry.resource(resource_type)?.import(id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let registry = self.registry()?;
        registry.data_source(data_source_type)?.read(config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::Credits;
    use crate::resources::measurement::TYPE_NAME as MEASUREMENT;
    use crate::testing::{
        assert_error_contains, assert_plan_changes_attribute, assert_plan_creates,
        assert_plan_does_not_change_attribute, assert_plan_replaces,
        assert_plan_updates_in_place, FakeAtlas, ProviderTester, TestError,
    };
    use serde_json::json;
    use std::sync::Mutex;

    fn scenario_config() -> Value {
        json!({
            "type": "ping",
            "description": "d",
            "target": "t",
            "probe_set": [{"number": 1, "type": "probes", "value": "123"}]
        })
    }

    async fn configured_tester(fake: &FakeAtlas) -> ProviderTester<RipeAtlasProvider> {
        let tester = ProviderTester::new(fake.provider());
        tester.configure(json!({"api_key": "X"})).await.unwrap();
        tester
    }

    #[test]
    fn test_resolve_api_key() {
        assert_eq!(resolve_api_key(Some("cfg"), Some("env".to_string())).unwrap(), "cfg");
        assert_eq!(resolve_api_key(None, Some("env".to_string())).unwrap(), "env");

        let diag = resolve_api_key(None, None).unwrap_err();
        assert_eq!(diag.summary, "Missing RIPE Atlas API Key");
        assert_eq!(diag.attribute.as_deref(), Some("api_key"));

        // a configured empty string does not fall back
        assert!(resolve_api_key(Some(""), Some("env".to_string())).is_err());
    }

    #[test]
    fn test_schema_names() {
        let provider = RipeAtlasProvider::new();
        let metadata = provider.metadata();
        assert_eq!(metadata.type_name, "ripe-atlas");
        assert_eq!(metadata.resources, vec!["ripe-atlas_measurement"]);
        assert_eq!(
            metadata.data_sources,
            vec!["ripe-atlas_credits", "ripe-atlas_measurement"]
        );

        let schema = provider.schema();
        let api_key = &schema.provider.block.attributes["api_key"];
        assert!(api_key.flags.required && api_key.flags.sensitive);
    }

    #[tokio::test]
    async fn test_configure_passes_key_to_factory() {
        let fake = FakeAtlas::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_in_factory = Arc::clone(&seen);
        let client = fake.client();

        let provider = RipeAtlasProvider::with_client_factory(move |config| {
            *seen_in_factory.lock().unwrap() = Some(config.api_key.clone());
            Ok(Arc::clone(&client))
        });
        let tester = ProviderTester::new(provider);
        tester.configure(json!({"api_key": "X"})).await.unwrap();

        assert_eq!(seen.lock().unwrap().as_deref(), Some("X"));
        assert!(tester.provider().is_configured());
    }

    #[tokio::test]
    async fn test_configure_empty_key() {
        let fake = FakeAtlas::new();
        let tester = ProviderTester::new(fake.provider());

        match tester.configure(json!({"api_key": ""})).await {
            Err(TestError::Diagnostics(diags)) => {
                assert_error_contains(&diags, "Missing RIPE Atlas API Key");
                assert_eq!(diags[0].attribute.as_deref(), Some("api_key"));
            },
            other => panic!("expected diagnostics, got {:?}", other),
        }
        assert!(!tester.provider().is_configured());
    }

    #[tokio::test]
    async fn test_configure_client_failure() {
        let tester = ProviderTester::new(RipeAtlasProvider::new());

        match tester.configure(json!({"api_key": "bad\nkey"})).await {
            Err(TestError::Diagnostics(diags)) => {
                assert_error_contains(&diags, "Unable to Create RIPE Atlas API Client");
                assert!(diags[0].detail.as_deref().unwrap().contains("RIPE Atlas Client Error"));
            },
            other => panic!("expected diagnostics, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_configure_rejects_wrong_type() {
        let fake = FakeAtlas::new();
        let tester = ProviderTester::new(fake.provider());

        let result = tester.configure(json!({"api_key": 42})).await;
        assert!(matches!(
            result,
            Err(TestError::Provider(ProviderError::Serialization(_)))
        ));

        match tester.validate_provider_config(json!({"api_key": 42})).await {
            Err(TestError::Diagnostics(diags)) => {
                assert_eq!(diags[0].attribute.as_deref(), Some("api_key"));
            },
            other => panic!("expected diagnostics, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validate_provider_config_with_key() {
        let fake = FakeAtlas::new();
        let tester = ProviderTester::new(fake.provider());
        tester
            .validate_provider_config(json!({"api_key": "X"}))
            .await
            .unwrap();
        assert!(!tester.provider().is_configured());
    }

    #[tokio::test]
    async fn test_calls_before_configure_fail() {
        let fake = FakeAtlas::new();
        let tester = ProviderTester::new(fake.provider());

        let err = tester.create(MEASUREMENT, scenario_config()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert_eq!(err.message(), "provider is not configured");

        let err = tester
            .read_data_source("ripe-atlas_credits", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_types() {
        let fake = FakeAtlas::new();
        let tester = configured_tester(&fake).await;

        let err = tester.read("ripe-atlas_probe", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));

        let err = tester
            .read_data_source("ripe-atlas_probe", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_create_scenario() {
        let fake = FakeAtlas::new();
        let tester = configured_tester(&fake).await;

        tester
            .validate_resource_config(MEASUREMENT, scenario_config())
            .await
            .unwrap();
        let state = tester
            .lifecycle_create(MEASUREMENT, scenario_config())
            .await
            .unwrap();

        assert!(state["id"].as_i64().unwrap() > 0);
        assert!(state["last_updated"].as_str().unwrap().ends_with("UTC"));
        assert_eq!(state["interval"], 300);
        assert_eq!(state["packets"], 3);
        assert_eq!(state["size"], 48);
        assert_eq!(
            state["probe_set"],
            json!([{"number": 1, "type": "probes", "value": "123"}])
        );

        let request = &fake.created()[0];
        assert_eq!(request.definitions[0].af, 4);
        assert!(!request.is_oneoff);
    }

    #[tokio::test]
    async fn test_validation_rejects_bad_values() {
        let fake = FakeAtlas::new();
        let tester = configured_tester(&fake).await;

        let mut config = scenario_config();
        config["interval"] = json!(5);
        config["type"] = json!("icmp");

        match tester.validate_resource_config(MEASUREMENT, config).await {
            Err(TestError::Diagnostics(diags)) => {
                let attrs: Vec<_> = diags.iter().filter_map(|d| d.attribute.as_deref()).collect();
                assert!(attrs.contains(&"interval"));
                assert!(attrs.contains(&"type"));
            },
            other => panic!("expected diagnostics, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_plan_rules() {
        let fake = FakeAtlas::new();
        let tester = configured_tester(&fake).await;

        let plan = tester.plan_create(MEASUREMENT, scenario_config()).await.unwrap();
        assert_plan_creates(&plan);
        assert_eq!(plan.planned_state["interval"], 300);

        let state = tester
            .create(MEASUREMENT, plan.planned_state)
            .await
            .unwrap();

        let mut renamed = state.clone();
        renamed["description"] = json!("renamed");
        renamed["id"] = Value::Null;
        renamed["last_updated"] = Value::Null;
        let plan = tester
            .plan_update(MEASUREMENT, state.clone(), renamed)
            .await
            .unwrap();
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "description");
        assert_plan_does_not_change_attribute(&plan, "id");
        assert_plan_does_not_change_attribute(&plan, "last_updated");
        assert_eq!(plan.planned_state["id"], state["id"]);

        let mut retargeted = state.clone();
        retargeted["target"] = json!("elsewhere");
        let plan = tester
            .plan_update(MEASUREMENT, state, retargeted)
            .await
            .unwrap();
        assert_plan_replaces(&plan);
        assert_plan_changes_attribute(&plan, "target");
    }

    #[tokio::test]
    async fn test_update_leaves_state_alone() {
        let fake = FakeAtlas::new();
        let tester = configured_tester(&fake).await;
        let state = tester
            .lifecycle_create(MEASUREMENT, scenario_config())
            .await
            .unwrap();

        let mut planned = state.clone();
        planned["description"] = json!("renamed");
        let err = tester
            .update(MEASUREMENT, state.clone(), planned)
            .await
            .unwrap_err();
        assert_eq!(err.to_diagnostic().summary, "Update not supported!");

        // the measurement upstream is untouched
        let refreshed = tester.read(MEASUREMENT, state.clone()).await.unwrap();
        assert_eq!(refreshed, state);
    }

    #[tokio::test]
    async fn test_import_lifecycle() {
        let fake = FakeAtlas::new();
        let tester = configured_tester(&fake).await;
        let created = tester
            .lifecycle_create(MEASUREMENT, scenario_config())
            .await
            .unwrap();
        let id = created["id"].as_i64().unwrap();

        let imported = tester
            .lifecycle_import(MEASUREMENT, &id.to_string())
            .await
            .unwrap();
        assert_eq!(imported["id"], id);
        assert_eq!(imported["target"], "t");
        assert_eq!(imported["probe_set"], created["probe_set"]);

        let calls = fake.calls();
        let err = tester.import_resource(MEASUREMENT, "abc").await.unwrap_err();
        assert_eq!(err.to_diagnostic().summary, "Error importing item");
        assert_eq!(fake.calls(), calls);
    }

    #[tokio::test]
    async fn test_delete_lifecycle() {
        let fake = FakeAtlas::new();
        let tester = configured_tester(&fake).await;
        let state = tester
            .lifecycle_create(MEASUREMENT, scenario_config())
            .await
            .unwrap();

        tester
            .lifecycle_delete(MEASUREMENT, state.clone())
            .await
            .unwrap();
        assert_eq!(fake.deleted(), vec![state["id"].as_i64().unwrap()]);
    }

    #[tokio::test]
    async fn test_data_sources_share_client() {
        let fake = FakeAtlas::new().with_credits(Credits {
            current_balance: 10,
            ..Default::default()
        });
        let tester = configured_tester(&fake).await;
        tester
            .lifecycle_create(MEASUREMENT, scenario_config())
            .await
            .unwrap();

        let credits = tester
            .read_data_source("ripe-atlas_credits", json!({}))
            .await
            .unwrap();
        assert_eq!(credits["current_balance"], 10);

        let listing = tester
            .read_data_source("ripe-atlas_measurement", json!({"hidden": false}))
            .await
            .unwrap();
        assert_eq!(listing["hidden"], false);
        assert_eq!(listing["measurements"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reconfigure_replaces_client() {
        let first = FakeAtlas::new();
        let second = FakeAtlas::new();
        let clients = Arc::new(Mutex::new(vec![second.client(), first.client()]));

        let provider = RipeAtlasProvider::with_client_factory(move |_| {
            Ok(clients.lock().unwrap().pop().unwrap())
        });
        let tester = ProviderTester::new(provider);

        tester.configure(json!({"api_key": "X"})).await.unwrap();
        tester.create(MEASUREMENT, scenario_config()).await.unwrap();
        tester.configure(json!({"api_key": "Y"})).await.unwrap();
        tester.create(MEASUREMENT, scenario_config()).await.unwrap();

        assert_eq!(first.created().len(), 1);
        assert_eq!(second.created().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_releases_client() {
        let fake = FakeAtlas::new();
        let tester = configured_tester(&fake).await;
        tester.stop().await.unwrap();
        assert!(!tester.provider().is_configured());
    }
}
