//! Shape normalization of a parsed model reply.
//!
//! Everything here heals instead of failing, except the top-level checks in
//! [`unwrap_top_level`].

use serde_json::{Map, Value};
use tracing::{debug, warn};

use edge_core::StructuredAgentResponse;

use crate::error::{NormalizeError, NormalizeResult};

/// A top-level key the model may emit outside `proposed_changes`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct KeyMigration {
    /// Key at the top level of the reply
    pub source: &'static str,
    /// Key inside `proposed_changes` it moves to
    pub target: &'static str,
}

/// Applied in order. A key already present in `proposed_changes` wins.
pub(crate) const VIEW_MIGRATIONS: &[KeyMigration] = &[
    KeyMigration {
        source: "tags_to_add",
        target: "tags_to_add",
    },
    KeyMigration {
        source: "component_to_add",
        target: "component_to_add",
    },
    KeyMigration {
        source: "components_to_add",
        target: "components_to_add",
    },
];

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Accept an object, or an array whose first element is an object.
pub(crate) fn unwrap_top_level(value: Value) -> NormalizeResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Array(items) => match items.into_iter().next() {
            Some(Value::Object(map)) => {
                debug!("Unwrapped object from top-level array");
                Ok(map)
            }
            _ => Err(NormalizeError::ListWithoutObject),
        },
        other => Err(NormalizeError::TopLevelNotObject {
            found: json_type(&other).to_string(),
        }),
    }
}

/// Fill in `message`, `steps` and `proposed_changes` when missing or mistyped.
pub(crate) fn apply_defaults(reply: &mut Map<String, Value>) {
    if reply.get("message").map_or(true, Value::is_null) {
        reply.insert(
            "message".to_string(),
            Value::String(StructuredAgentResponse::DEFAULT_MESSAGE.to_string()),
        );
    }

    if !reply.get("steps").is_some_and(Value::is_array) {
        if reply.contains_key("steps") {
            warn!("Discarding non-array steps");
        }
        reply.insert("steps".to_string(), Value::Array(Vec::new()));
    }

    if !reply.get("proposed_changes").is_some_and(Value::is_object) {
        if reply.contains_key("proposed_changes") {
            warn!("Replacing non-object proposed_changes");
        }
        reply.insert("proposed_changes".to_string(), Value::Object(Map::new()));
    }

    if let Some(Value::Object(changes)) = reply.get_mut("proposed_changes") {
        if changes.get("hmi").map_or(true, Value::is_null) {
            changes.insert("hmi".to_string(), Value::Object(Map::new()));
        }
    }
}

/// Move stray top-level patch keys into `proposed_changes` and default the
/// view-building collections.
///
/// Must run after [`apply_defaults`].
pub(crate) fn migrate_view_keys(reply: &mut Map<String, Value>) {
    let mut stray = Vec::new();
    for migration in VIEW_MIGRATIONS {
        if let Some(value) = reply.remove(migration.source) {
            stray.push((migration, value));
        }
    }

    let Some(Value::Object(changes)) = reply.get_mut("proposed_changes") else {
        return;
    };

    for (migration, value) in stray {
        if changes.contains_key(migration.target) {
            debug!(key = migration.source, "Dropping top-level key shadowed by nested one");
            continue;
        }
        debug!(key = migration.source, "Moved top-level key into proposed_changes");
        changes.insert(migration.target.to_string(), value);
    }

    if changes.contains_key("component_to_add") && changes.remove("components_to_add").is_some() {
        warn!("Both component_to_add and components_to_add present; keeping component_to_add");
    }

    if !changes.contains_key("tags_to_add") {
        changes.insert("tags_to_add".to_string(), Value::Object(Map::new()));
    }
    if !changes.contains_key("component_to_add") && !changes.contains_key("components_to_add") {
        changes.insert("component_to_add".to_string(), Value::Object(Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_unwrap_object_and_array() {
        assert!(unwrap_top_level(json!({"a": 1})).is_ok());
        let map = unwrap_top_level(json!([{"message": "x"}, {"message": "y"}])).unwrap();
        assert_eq!(map["message"], json!("x"));
    }

    #[test]
    fn test_unwrap_rejects() {
        assert_eq!(unwrap_top_level(json!([])), Err(NormalizeError::ListWithoutObject));
        assert_eq!(unwrap_top_level(json!([1, {"a": 1}])), Err(NormalizeError::ListWithoutObject));
        assert_eq!(
            unwrap_top_level(json!("text")),
            Err(NormalizeError::TopLevelNotObject {
                found: "string".to_string()
            })
        );
    }

    #[test]
    fn test_defaults_fill_missing() {
        let mut reply = Map::new();
        apply_defaults(&mut reply);
        assert_eq!(
            Value::Object(reply),
            json!({
                "message": "No message provided.",
                "steps": [],
                "proposed_changes": {"hmi": {}}
            })
        );
    }

    #[test]
    fn test_defaults_replace_wrong_types() {
        let mut reply = object(json!({"message": "m", "steps": "do it", "proposed_changes": [1]}));
        apply_defaults(&mut reply);
        assert_eq!(reply["steps"], json!([]));
        assert_eq!(reply["proposed_changes"], json!({"hmi": {}}));
    }

    #[test]
    fn test_defaults_keep_existing_hmi() {
        let mut reply = object(json!({"proposed_changes": {"hmi": {"views": []}}}));
        apply_defaults(&mut reply);
        assert_eq!(reply["proposed_changes"], json!({"hmi": {"views": []}}));
    }

    #[test]
    fn test_migration_moves_stray_keys() {
        let mut reply = object(json!({
            "message": "m",
            "tags_to_add": {"Speed": {"dataType": "REAL"}},
            "components_to_add": [{"type": "button"}]
        }));
        apply_defaults(&mut reply);
        migrate_view_keys(&mut reply);
        assert!(!reply.contains_key("tags_to_add"));
        assert_eq!(
            reply["proposed_changes"],
            json!({
                "hmi": {},
                "tags_to_add": {"Speed": {"dataType": "REAL"}},
                "components_to_add": [{"type": "button"}]
            })
        );
    }

    #[test]
    fn test_migration_nested_wins() {
        let mut reply = object(json!({
            "tags_to_add": {"Outer": {}},
            "proposed_changes": {"tags_to_add": {"Inner": {}}}
        }));
        apply_defaults(&mut reply);
        migrate_view_keys(&mut reply);
        assert_eq!(reply["proposed_changes"]["tags_to_add"], json!({"Inner": {}}));
    }

    #[test]
    fn test_migration_prefers_singular_component() {
        let mut reply = object(json!({
            "component_to_add": {"type": "label"},
            "proposed_changes": {"components_to_add": [{"type": "button"}]}
        }));
        apply_defaults(&mut reply);
        migrate_view_keys(&mut reply);
        let changes = reply["proposed_changes"].as_object().unwrap();
        assert_eq!(changes["component_to_add"], json!({"type": "label"}));
        assert!(!changes.contains_key("components_to_add"));
    }

    #[test]
    fn test_migration_defaults_collections() {
        let mut reply = object(json!({"message": "m"}));
        apply_defaults(&mut reply);
        migrate_view_keys(&mut reply);
        assert_eq!(
            reply["proposed_changes"],
            json!({"hmi": {}, "tags_to_add": {}, "component_to_add": {}})
        );
    }
}
