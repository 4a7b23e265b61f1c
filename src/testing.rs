//! Test harness for the provider.
//!
//! [`ProviderTester`] drives a [`ProviderService`] without a gRPC server and
//! [`FakeAtlas`] stands in for the RIPE Atlas API.
//!
//! # Example
//!
//! ```ignore
//! use terraform_provider_ripe_atlas::testing::{FakeAtlas, ProviderTester};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_measurement() {
//!     let fake = FakeAtlas::new();
//!     let tester = ProviderTester::new(fake.provider());
//!     tester.configure(json!({"api_key": "X"})).await.unwrap();
//!
//!     let state = tester.lifecycle_create("ripe-atlas_measurement", json!({
//!         "type": "ping",
//!         "description": "d",
//!         "target": "example.net",
//!         "probe_set": [{"number": 1, "type": "probes", "value": "123"}]
//!     })).await.unwrap();
//!
//!     assert!(state["id"].as_i64().unwrap() > 0);
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::atlas::{
    AtlasApi, AtlasError, Credits, Measurement, MeasurementFilter, MeasurementIds,
    MeasurementRequest, MeasurementStatus, ParticipationRequest,
};
use crate::error::ProviderError;
use crate::provider::RipeAtlasProvider;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Drives a provider the way the host would, minus the transport.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Validate provider configuration; error diagnostics become `Err`.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider; error diagnostics become `Err`.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a create.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan a change to an existing resource.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.plan(
            resource_type,
            Some(prior_state),
            proposed_state.clone(),
            proposed_state,
        )
        .await
    }

    /// Plan a destroy.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Plan with an explicit config.
    pub async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, prior_state, proposed_state, config)
            .await
    }

    #[allow(missing_docs)]
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    #[allow(missing_docs)]
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    #[allow(missing_docs)]
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    #[allow(missing_docs)]
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    #[allow(missing_docs)]
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// Plan, create, then read. Returns the state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Import by id, then read. Returns the state after read.
    pub async fn lifecycle_import(&self, resource_type: &str, id: &str) -> Result<Value, ProviderError> {
        let imported = self.import_resource(resource_type, id).await?;
        let state = imported
            .into_iter()
            .next()
            .map(|resource| resource.state)
            .unwrap_or(Value::Null);
        self.read(resource_type, state).await
    }

    /// Plan a destroy, then delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }
}

/// Failure of a tester call.
#[derive(Debug)]
pub enum TestError {
    /// Error diagnostics were returned.
    Diagnostics(Vec<Diagnostic>),
    /// The call itself failed.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// Assert the plan creates the resource.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(!plan.requires_replace, "Expected plan to create, not replace");
}

/// Assert the plan is a no-op.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        changed_paths(plan)
    );
}

/// Assert the plan changes something.
///
/// # Panics
///
/// Panics if the plan has no changes.
pub fn assert_plan_has_changes(plan: &PlanResult) {
    assert!(
        plan.has_changes(),
        "Expected plan to have changes, but got no changes"
    );
}

/// Assert the plan forces replacement.
///
/// # Panics
///
/// Panics if it does not.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert the plan does not force replacement.
///
/// # Panics
///
/// Panics if it does.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert the plan changes `path`.
///
/// # Panics
///
/// Panics if `path` is not among the changes.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        changed_paths(plan)
    );
}

/// Assert the plan leaves `path` alone.
///
/// # Panics
///
/// Panics if `path` is among the changes.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !plan.changes.iter().any(|c| c.path == path),
        "Expected plan to not change attribute '{}', but it was changed",
        path
    );
}

/// Assert there are no error diagnostics.
///
/// # Panics
///
/// Panics on any error diagnostic.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert there is at least one error diagnostic.
///
/// # Panics
///
/// Panics if there is none.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(Diagnostic::is_error),
        "Expected at least one error, but got none"
    );
}

/// Assert some error diagnostic's summary contains `substring`.
///
/// # Panics
///
/// Panics if none does.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    assert!(
        diagnostics
            .iter()
            .any(|d| matches!(d.severity, DiagnosticSeverity::Error) && d.summary.contains(substring)),
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

const FIRST_FAKE_ID: i64 = 1_000_001;

#[derive(Default)]
struct FakeState {
    credits: Credits,
    measurements: BTreeMap<i64, Measurement>,
    next_id: i64,
    created_ids: Option<Vec<i64>>,
    failure: Option<(u16, String)>,
    created: Vec<MeasurementRequest>,
    deleted: Vec<i64>,
    filters: Vec<MeasurementFilter>,
    calls: usize,
}

/// In-memory RIPE Atlas.
///
/// Clones share state, so a test can keep one handle while the provider owns
/// another. Unknown measurement ids answer 404.
#[derive(Clone)]
pub struct FakeAtlas {
    state: Arc<Mutex<FakeState>>,
}

impl FakeAtlas {
    /// An empty account.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                next_id: FIRST_FAKE_ID,
                ..Default::default()
            })),
        }
    }

    /// Serve `credits` from the credits endpoint.
    pub fn with_credits(self, credits: Credits) -> Self {
        self.state().credits = credits;
        self
    }

    /// Seed an existing measurement.
    pub fn with_measurement(self, measurement: Measurement) -> Self {
        self.state()
            .measurements
            .insert(measurement.id, measurement);
        self
    }

    /// Answer every create with exactly `ids`.
    pub fn with_created_ids(self, ids: Vec<i64>) -> Self {
        self.state().created_ids = Some(ids);
        self
    }

    /// Fail every later call with `status` and `detail`.
    pub fn fail_with(&self, status: u16, detail: &str) {
        self.state().failure = Some((status, detail.to_string()));
    }

    /// A client handle onto this fake.
    pub fn client(&self) -> Arc<dyn AtlasApi> {
        Arc::new(self.clone())
    }

    /// A provider whose Configure always yields this fake.
    pub fn provider(&self) -> RipeAtlasProvider {
        let client = self.client();
        RipeAtlasProvider::with_client_factory(move |_| Ok(Arc::clone(&client)))
    }

    /// Create requests received so far.
    pub fn created(&self) -> Vec<MeasurementRequest> {
        self.state().created.clone()
    }

    /// Ids deleted so far.
    pub fn deleted(&self) -> Vec<i64> {
        self.state().deleted.clone()
    }

    /// Listing filters received so far.
    pub fn filters(&self) -> Vec<MeasurementFilter> {
        self.state().filters.clone()
    }

    /// Number of API calls received.
    pub fn calls(&self) -> usize {
        self.state().calls
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and apply any injected failure.
    fn begin(&self) -> Result<MutexGuard<'_, FakeState>, AtlasError> {
        let mut state = self.state();
        state.calls += 1;
        if let Some((status, detail)) = &state.failure {
            return Err(AtlasError::Api {
                status: *status,
                detail: detail.clone(),
            });
        }
        Ok(state)
    }
}

impl Default for FakeAtlas {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found() -> AtlasError {
    AtlasError::Api {
        status: 404,
        detail: "Not found.".to_string(),
    }
}

fn scheduled(id: i64, request: &MeasurementRequest) -> Measurement {
    let definition = request.definitions.first();
    let requested = request.probes.iter().map(|p| p.requested).sum();
    Measurement {
        id,
        description: definition.map(|d| d.description.clone()).unwrap_or_default(),
        kind: definition.map(|d| d.kind.clone()).unwrap_or_default(),
        target: definition.map(|d| d.target.clone()).unwrap_or_default(),
        interval: definition.map(|d| d.interval).unwrap_or_default(),
        packets: definition.map(|d| d.packets).unwrap_or_default(),
        size: definition.map(|d| d.size).unwrap_or_default(),
        status: MeasurementStatus {
            id: 0,
            name: "Specified".to_string(),
        },
        probes_requested: requested,
        probes_scheduled: 0,
        participation_requests: request
            .probes
            .iter()
            .map(|p| ParticipationRequest {
                requested: p.requested,
                kind: p.kind.clone(),
                value: p.value.clone(),
            })
            .collect(),
    }
}

#[async_trait]
impl AtlasApi for FakeAtlas {
    async fn credits(&self) -> Result<Credits, AtlasError> {
        Ok(self.begin()?.credits.clone())
    }

    async fn measurements(&self, filter: &MeasurementFilter) -> Result<Vec<Measurement>, AtlasError> {
        let mut state = self.begin()?;
        state.filters.push(filter.clone());
        Ok(state.measurements.values().cloned().collect())
    }

    async fn measurement(&self, id: i64) -> Result<Measurement, AtlasError> {
        self.begin()?
            .measurements
            .get(&id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn create_ping(&self, request: &MeasurementRequest) -> Result<MeasurementIds, AtlasError> {
        let mut state = self.begin()?;
        state.created.push(request.clone());

        let ids = match state.created_ids.clone() {
            Some(ids) => ids,
            None => {
                let id = state.next_id;
                state.next_id += 1;
                vec![id]
            },
        };
        for &id in &ids {
            state.measurements.insert(id, scheduled(id, request));
        }
        Ok(MeasurementIds { measurements: ids })
    }

    async fn delete_measurement(&self, id: i64) -> Result<(), AtlasError> {
        let mut state = self.begin()?;
        state.measurements.remove(&id).ok_or_else(not_found)?;
        state.deleted.push(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::{MeasurementDefinition, ProbeSetRequest};
    use crate::types::AttributeChange;
    use serde_json::json;

    fn ping(target: &str) -> MeasurementRequest {
        MeasurementRequest {
            definitions: vec![MeasurementDefinition {
                kind: "ping".to_string(),
                af: 4,
                target: target.to_string(),
                description: "d".to_string(),
                packets: 3,
                interval: 300,
                size: 48,
            }],
            probes: vec![ProbeSetRequest {
                requested: 2,
                kind: "country".to_string(),
                value: "NL".to_string(),
            }],
            is_oneoff: false,
        }
    }

    #[tokio::test]
    async fn test_fake_create_then_fetch() {
        let fake = FakeAtlas::new();
        let ids = fake.create_ping(&ping("example.net")).await.unwrap();
        let id = ids.measurements[0];
        assert!(id > 0);

        let measurement = fake.measurement(id).await.unwrap();
        assert_eq!(measurement.target, "example.net");
        assert_eq!(measurement.probes_requested, 2);
        assert_eq!(measurement.participation_requests[0].value, "NL");

        let next = fake.create_ping(&ping("example.org")).await.unwrap();
        assert_eq!(next.measurements[0], id + 1);
        assert_eq!(fake.calls(), 3);
    }

    #[tokio::test]
    async fn test_fake_unknown_id() {
        let fake = FakeAtlas::new();
        assert!(matches!(
            fake.measurement(1).await,
            Err(AtlasError::Api { status: 404, .. })
        ));
        assert!(fake.delete_measurement(1).await.is_err());
        assert!(fake.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_fake_failure_applies_to_clones() {
        let fake = FakeAtlas::new();
        let client = fake.client();
        fake.fail_with(503, "down");

        match client.credits().await {
            Err(AtlasError::Api { status, detail }) => {
                assert_eq!(status, 503);
                assert_eq!(detail, "down");
            },
            other => panic!("expected api error, got {:?}", other),
        }
        assert_eq!(fake.calls(), 1);
    }

    #[test]
    fn test_check_diagnostics_ignores_warnings() {
        assert!(check_diagnostics(vec![Diagnostic::warning("heads up")]).is_ok());
        assert!(matches!(
            check_diagnostics(vec![Diagnostic::warning("w"), Diagnostic::error("e")]),
            Err(TestError::Diagnostics(errors)) if errors.len() == 1
        ));
    }

    #[tokio::test]
    async fn test_tester_types() {
        let tester = ProviderTester::new(FakeAtlas::new().provider());
        assert_eq!(tester.resource_types(), vec!["ripe-atlas_measurement"]);
        assert!(tester.data_source_types().contains(&"ripe-atlas_credits".to_string()));
        assert!(tester.schema().resources.contains_key("ripe-atlas_measurement"));
    }

    #[tokio::test]
    async fn test_tester_plan_delete() {
        let tester = ProviderTester::new(FakeAtlas::new().provider());
        let plan = tester
            .plan_delete("ripe-atlas_measurement", json!({"id": 7, "description": "d"}))
            .await
            .unwrap();

        assert_eq!(plan.planned_state, Value::Null);
        assert_plan_changes_attribute(&plan, "id");
        assert_plan_updates_in_place(&plan);
    }

    #[tokio::test]
    async fn test_tester_plan_unchanged() {
        let tester = ProviderTester::new(FakeAtlas::new().provider());
        let state = json!({
            "id": 7,
            "description": "d",
            "type": "ping",
            "target": "t",
            "interval": 300,
            "packets": 3,
            "size": 48,
            "last_updated": "Monday, 02-Jan-06 15:04:05 UTC",
            "probe_set": [{"number": 1, "type": "probes", "value": "1"}]
        });
        let plan = tester
            .plan_update("ripe-atlas_measurement", state.clone(), state)
            .await
            .unwrap();
        assert_plan_no_changes(&plan);
    }

    #[tokio::test]
    async fn test_tester_validate_data_source_config() {
        let tester = ProviderTester::new(FakeAtlas::new().provider());
        assert!(tester
            .validate_data_source_config("ripe-atlas_measurement", json!({"hidden": true}))
            .await
            .is_ok());
        assert!(tester
            .validate_data_source_config("ripe-atlas_measurement", json!({"hidden": 3}))
            .await
            .is_err());
    }

    #[test]
    fn test_assert_plan_helpers() {
        let plan = PlanResult::with_changes(
            json!({"description": "b"}),
            vec![AttributeChange::modified("description", json!("a"), json!("b"))],
            false,
        );
        assert_plan_has_changes(&plan);
        assert_plan_changes_attribute(&plan, "description");
        assert_plan_does_not_change_attribute(&plan, "target");
    }

    #[test]
    #[should_panic(expected = "Expected plan to have changes")]
    fn test_assert_plan_has_changes_fails() {
        assert_plan_has_changes(&PlanResult::no_change(json!({"id": 1})));
    }

    #[test]
    #[should_panic(expected = "Expected plan to require replacement")]
    fn test_assert_plan_replaces_fails() {
        assert_plan_replaces(&PlanResult::no_change(json!({})));
    }

    #[test]
    fn test_assert_no_errors() {
        assert_no_errors(&[Diagnostic::warning("Just a warning")]);
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_fails() {
        assert_no_errors(&[Diagnostic::error("An error")]);
    }

    #[test]
    fn test_assert_error_contains() {
        let diagnostics = vec![Diagnostic::error("Missing RIPE Atlas API Key")];
        assert_has_errors(&diagnostics);
        assert_error_contains(&diagnostics, "API Key");
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("First error").with_attribute("api_key"),
            Diagnostic::error("Second error").with_detail("More info"),
        ]);

        let display = err.to_string();
        assert!(display.contains("First error"));
        assert!(display.contains("Second error"));
        assert!(display.contains("api_key"));
        assert!(display.contains("More info"));
    }
}
