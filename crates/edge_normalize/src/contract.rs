//! Mapping a shape-normalized reply onto [`StructuredAgentResponse`].
//!
//! Walks the JSON by hand instead of deserializing so that a mismatch names
//! the exact offending field (`steps[2].title`, `proposed_changes.hmi.views[0]`).

use serde_json::{Map, Value};
use tracing::warn;

use edge_core::{AgentStep, HmiPatch, ProposedChanges, StructuredAgentResponse, TagSet};

use crate::error::{NormalizeError, NormalizeResult};
use crate::shape::json_type;

fn expected(field: impl Into<String>, what: &str, found: &Value) -> NormalizeError {
    NormalizeError::violation(field, format!("expected {what}, found {}", json_type(found)))
}

/// Validate a reply that already went through [`crate::shape::apply_defaults`].
pub(crate) fn validate(mut reply: Map<String, Value>) -> NormalizeResult<StructuredAgentResponse> {
    let message = match reply.remove("message") {
        Some(Value::String(message)) => message,
        Some(scalar @ (Value::Number(_) | Value::Bool(_))) => {
            warn!(found = json_type(&scalar), "Coercing non-string message to text");
            scalar.to_string()
        }
        Some(other) => return Err(expected("message", "string", &other)),
        None => StructuredAgentResponse::DEFAULT_MESSAGE.to_string(),
    };

    let steps = match reply.remove("steps") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| step(i, item))
            .collect::<NormalizeResult<Vec<_>>>()?,
        Some(other) => return Err(expected("steps", "array", &other)),
        None => Vec::new(),
    };

    let proposed_changes = match reply.remove("proposed_changes") {
        Some(Value::Object(changes)) => proposed_changes(changes)?,
        Some(other) => return Err(expected("proposed_changes", "object", &other)),
        None => ProposedChanges::default(),
    };

    if !reply.is_empty() {
        let keys: Vec<&String> = reply.keys().collect();
        warn!(?keys, "Ignoring unknown top-level keys in model reply");
    }

    Ok(StructuredAgentResponse {
        message,
        steps,
        proposed_changes,
    })
}

fn step(index: usize, item: &Value) -> NormalizeResult<AgentStep> {
    let field = format!("steps[{index}]");
    let Value::Object(map) = item else {
        return Err(expected(field, "object", item));
    };
    let text = |key: &str| match map.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(expected(format!("{field}.{key}"), "string", other)),
        None => Err(NormalizeError::violation(
            format!("{field}.{key}"),
            "missing required field",
        )),
    };
    Ok(AgentStep::new(text("title")?, text("details")?))
}

fn proposed_changes(mut changes: Map<String, Value>) -> NormalizeResult<ProposedChanges> {
    let hmi = match changes.remove("hmi") {
        Some(Value::Object(hmi)) => hmi_patch(hmi)?,
        Some(Value::Null) | None => HmiPatch::default(),
        Some(other) => return Err(expected("proposed_changes.hmi", "object", &other)),
    };

    let tags_to_add = match changes.remove("tags_to_add") {
        Some(Value::Object(tags)) => Some(tags),
        Some(Value::Array(items)) => Some(tags_from_sequence(items)?),
        Some(Value::Null) | None => None,
        Some(other) => {
            return Err(expected(
                "proposed_changes.tags_to_add",
                "object or array",
                &other,
            ))
        }
    };

    let component_to_add = changes.remove("component_to_add").filter(|v| !v.is_null());
    let components_to_add = changes.remove("components_to_add").filter(|v| !v.is_null());

    Ok(ProposedChanges {
        hmi,
        tags_to_add,
        component_to_add,
        components_to_add,
        extra: changes,
    })
}

fn hmi_patch(mut hmi: Map<String, Value>) -> NormalizeResult<HmiPatch> {
    let views = match hmi.remove("views") {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(view) => Ok(view),
                    other => Err(expected(
                        format!("proposed_changes.hmi.views[{i}]"),
                        "object",
                        &other,
                    )),
                })
                .collect::<NormalizeResult<Vec<_>>>()?,
        ),
        Some(Value::Null) | None => None,
        Some(other) => return Err(expected("proposed_changes.hmi.views", "array", &other)),
    };

    let general = match hmi.remove("general") {
        Some(Value::Object(general)) => Some(general),
        Some(Value::Null) | None => None,
        Some(other) => return Err(expected("proposed_changes.hmi.general", "object", &other)),
    };

    Ok(HmiPatch {
        views,
        general,
        extra: hmi,
    })
}

/// Convert `[{"name": "Speed", ...}]` into `{"Speed": {...}}`.
fn tags_from_sequence(items: Vec<Value>) -> NormalizeResult<TagSet> {
    let mut tags = TagSet::new();
    for (i, item) in items.into_iter().enumerate() {
        let field = format!("proposed_changes.tags_to_add[{i}]");
        let mut definition = match item {
            Value::Object(definition) => definition,
            other => return Err(expected(field, "object", &other)),
        };
        let name = ["name", "tagName"]
            .iter()
            .find_map(|key| match definition.get(*key) {
                Some(Value::String(name)) if !name.is_empty() => Some((*key, name.clone())),
                _ => None,
            });
        let Some((key, name)) = name else {
            return Err(NormalizeError::violation(
                format!("{field}.name"),
                "tag definition has no name",
            ));
        };
        definition.remove(key);
        if tags.insert(name.clone(), Value::Object(definition)).is_some() {
            warn!(tag = %name, "Duplicate tag in tags_to_add; keeping the last definition");
        }
    }
    Ok(tags)
}
