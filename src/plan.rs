//! Schema-driven planning.
//!
//! [`plan_resource`] turns the host's proposed state into a planned state:
//! defaults fill unset attributes, `use_state_for_unknown` attributes keep
//! their prior value, and a change to any `force_new` attribute marks the
//! plan as a replacement.

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::schema::Schema;
use crate::types::{AttributeChange, PlanResult};

/// Plan a change from `prior` (None when creating) to `proposed`.
///
/// A `null` proposed state plans a destroy.
pub fn plan_resource(
    schema: &Schema,
    prior: Option<&Value>,
    proposed: &Value,
) -> Result<PlanResult, ProviderError> {
    let prior = match prior {
        Some(Value::Null) | None => None,
        Some(Value::Object(map)) => Some(map),
        Some(other) => {
            return Err(ProviderError::Validation(format!(
                "prior state must be an object, got {}",
                other
            )))
        },
    };

    let proposed = match proposed {
        Value::Null => return Ok(plan_destroy(prior)),
        Value::Object(map) => map,
        other => {
            return Err(ProviderError::Validation(format!(
                "proposed state must be an object, got {}",
                other
            )))
        },
    };

    let mut planned = proposed.clone();
    for (name, attr) in &schema.block.attributes {
        if let Some(default) = &attr.default {
            if is_unset(planned.get(name)) {
                planned.insert(name.clone(), default.clone());
            }
        }
    }

    let requires_replace = match prior {
        Some(prior) => schema.block.attributes.iter().any(|(name, attr)| {
            attr.force_new && value_of(prior, name) != value_of(&planned, name)
        }),
        None => false,
    };

    if let Some(prior) = prior {
        for (name, attr) in &schema.block.attributes {
            if !attr.use_state_for_unknown || !is_unset(planned.get(name)) {
                continue;
            }
            // A replacement gets fresh computed values.
            let carried = if requires_replace {
                Value::Null
            } else {
                value_of(prior, name).clone()
            };
            planned.insert(name.clone(), carried);
        }
    }

    let changes = diff(prior, &planned);
    Ok(PlanResult::with_changes(
        Value::Object(planned),
        changes,
        requires_replace,
    ))
}

fn plan_destroy(prior: Option<&Map<String, Value>>) -> PlanResult {
    let changes = prior
        .map(|prior| {
            prior
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| AttributeChange::removed(k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();
    PlanResult::with_changes(Value::Null, changes, false)
}

fn diff(prior: Option<&Map<String, Value>>, planned: &Map<String, Value>) -> Vec<AttributeChange> {
    let empty = Map::new();
    let prior = prior.unwrap_or(&empty);

    let mut names: Vec<&String> = prior.keys().chain(planned.keys()).collect();
    names.sort();
    names.dedup();

    names
        .into_iter()
        .filter_map(|name| {
            let before = value_of(prior, name);
            let after = value_of(planned, name);
            match (before.is_null(), after.is_null()) {
                (true, true) => None,
                _ if before == after => None,
                (true, false) => Some(AttributeChange::added(name.clone(), after.clone())),
                (false, true) => Some(AttributeChange::removed(name.clone(), before.clone())),
                (false, false) => Some(AttributeChange::modified(
                    name.clone(),
                    before.clone(),
                    after.clone(),
                )),
            }
        })
        .collect()
}

fn value_of<'a>(map: &'a Map<String, Value>, name: &str) -> &'a Value {
    map.get(name).unwrap_or(&Value::Null)
}

fn is_unset(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("description", Attribute::required_string())
            .with_attribute("target", Attribute::required_string().with_force_new())
            .with_attribute(
                "interval",
                Attribute::optional_computed_int64()
                    .with_default(json!(300))
                    .with_force_new(),
            )
            .with_attribute(
                "id",
                Attribute::computed_int64().with_use_state_for_unknown(),
            )
    }

    fn prior() -> Value {
        json!({"description": "d", "target": "a.net", "interval": 300, "id": 7})
    }

    #[test]
    fn test_create_fills_defaults() {
        let plan = plan_resource(&schema(), None, &json!({"description": "d", "target": "a.net"}))
            .unwrap();

        assert_eq!(plan.planned_state["interval"], 300);
        assert!(plan.planned_state.get("id").is_none());
        assert!(!plan.requires_replace);
        assert!(plan
            .changes
            .contains(&AttributeChange::added("interval", json!(300))));
    }

    #[test]
    fn test_configured_value_beats_default() {
        let plan = plan_resource(
            &schema(),
            None,
            &json!({"description": "d", "target": "a.net", "interval": 60}),
        )
        .unwrap();
        assert_eq!(plan.planned_state["interval"], 60);
    }

    #[test]
    fn test_in_place_change_keeps_id() {
        let proposed = json!({"description": "new", "target": "a.net", "interval": 300, "id": null});
        let plan = plan_resource(&schema(), Some(&prior()), &proposed).unwrap();

        assert!(!plan.requires_replace);
        assert_eq!(plan.planned_state["id"], 7);
        assert_eq!(
            plan.changes,
            vec![AttributeChange::modified("description", json!("d"), json!("new"))]
        );
    }

    #[test]
    fn test_force_new_change_requires_replace() {
        let proposed = json!({"description": "d", "target": "b.net", "interval": 300, "id": null});
        let plan = plan_resource(&schema(), Some(&prior()), &proposed).unwrap();

        assert!(plan.requires_replace);
        assert_eq!(plan.planned_state["id"], Value::Null);
        assert!(plan
            .changes
            .contains(&AttributeChange::modified("target", json!("a.net"), json!("b.net"))));
        assert!(plan.changes.contains(&AttributeChange::removed("id", json!(7))));
    }

    #[test]
    fn test_default_compared_against_prior() {
        // interval unset in config but equal to the default: no replacement
        let proposed = json!({"description": "d", "target": "a.net", "interval": null, "id": null});
        let plan = plan_resource(&schema(), Some(&prior()), &proposed).unwrap();

        assert!(!plan.requires_replace);
        assert!(plan.changes.is_empty());
    }

    #[test]
    fn test_destroy() {
        let plan = plan_resource(&schema(), Some(&prior()), &Value::Null).unwrap();

        assert_eq!(plan.planned_state, Value::Null);
        assert!(!plan.requires_replace);
        assert_eq!(plan.changes.len(), 4);
        assert!(plan.changes.iter().all(|c| c.after.is_none()));
    }

    #[test]
    fn test_rejects_non_object_state() {
        let result = plan_resource(&schema(), None, &json!("nope"));
        assert!(matches!(result, Err(ProviderError::Validation(_))));
    }
}
