//! Structured-output schema reconciliation.
//!
//! Providers reject schemas with missing or whitespace-ridden names, and
//! strict mode requires every object node to be closed. User-authored
//! schemas also routinely drift between naming conventions, declaring
//! `required: ["video_idea"]` against `properties: {videoIdea}`. The
//! reconciler repairs all of that on a copy before the spec is handed to
//! the model capability.
//!
//! The required-field repair is heuristic and best-effort: candidates are
//! tried in a fixed order and the first hit wins, so an ambiguous schema
//! can be repaired to the wrong property. Unresolvable entries are kept
//! unchanged and logged; that leaves the schema inconsistent but is not
//! an error.

use plumeflow_models::StructuredOutputSpec;
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_SCHEMA_NAME: &str = "structured_output_schema";

/// Return a corrected copy of the spec. Idempotent; the input is never
/// mutated.
pub fn reconcile(spec: &StructuredOutputSpec) -> StructuredOutputSpec {
    let mut fixed = spec.clone();

    let name = fixed.name.take().unwrap_or_default();
    if name.is_empty() {
        debug!("Schema missing a name, using default");
        fixed.name = Some(DEFAULT_SCHEMA_NAME.to_string());
    } else {
        fixed.name = Some(normalize_name(&name));
    }

    if fixed.strict {
        close_object_nodes(&mut fixed.schema);
    }

    repair_required_fields(&mut fixed.schema);

    fixed
}

/// Collapse every whitespace run to a single underscore.
fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for ch in name.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
        } else {
            out.push(ch);
            in_whitespace = false;
        }
    }
    out
}

/// Add `additionalProperties: false` to object nodes that do not declare
/// the key. Nodes that already declare it (even as `true`) are left
/// alone.
fn close_object_nodes(value: &mut Value) {
    let Value::Object(node) = value else {
        return;
    };

    if node.get("type").and_then(Value::as_str) == Some("object")
        && !node.contains_key("additionalProperties")
    {
        node.insert("additionalProperties".to_string(), Value::Bool(false));
    }

    if let Some(Value::Object(properties)) = node.get_mut("properties") {
        for property in properties.values_mut() {
            close_object_nodes(property);
        }
    }
    if let Some(items) = node.get_mut("items") {
        close_object_nodes(items);
    }
}

/// Rewrite `required` entries that name no property, at every node that
/// declares both `required` and `properties`.
fn repair_required_fields(value: &mut Value) {
    let Value::Object(node) = value else {
        return;
    };

    let property_keys: Option<Vec<String>> = node
        .get("properties")
        .and_then(Value::as_object)
        .map(|properties| properties.keys().cloned().collect());

    if let Some(keys) = property_keys {
        if let Some(Value::Array(required)) = node.get_mut("required") {
            for entry in required.iter_mut() {
                let Some(field) = entry.as_str() else {
                    continue;
                };
                if keys.iter().any(|key| key == field) {
                    continue;
                }
                match resolve_required_entry(field, &keys) {
                    Some(replacement) => {
                        debug!(field, replacement = %replacement, "Repaired required field");
                        *entry = Value::String(replacement);
                    }
                    None => {
                        warn!(field, "Required field matches no property, keeping as-is");
                    }
                }
            }
        }
    }

    if let Some(Value::Object(properties)) = node.get_mut("properties") {
        for property in properties.values_mut() {
            repair_required_fields(property);
        }
    }
    if let Some(items) = node.get_mut("items") {
        repair_required_fields(items);
    }
}

/// Trial order: for each of [the name itself, camelCase, snake_case,
/// whitespace stripped, underscores as spaces], an exact match is probed
/// first, then a case-insensitive one. First hit wins.
fn resolve_required_entry(field: &str, property_keys: &[String]) -> Option<String> {
    let candidates = [
        field.to_string(),
        snake_to_camel(field),
        camel_to_snake(field),
        remove_whitespace(field),
        underscores_to_spaces(field),
    ];

    for candidate in candidates {
        if property_keys.iter().any(|key| *key == candidate) {
            return Some(candidate);
        }
        let lowered = candidate.to_lowercase();
        if let Some(hit) = property_keys.iter().find(|key| key.to_lowercase() == lowered) {
            return Some(hit.clone());
        }
    }
    None
}

/// `video_idea` -> `videoIdea`; only `_` followed by a lowercase letter
/// collapses.
fn snake_to_camel(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '_' {
            if let Some(next) = chars.peek().copied() {
                if next.is_ascii_lowercase() {
                    chars.next();
                    out.push(next.to_ascii_uppercase());
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}

/// `videoIdea` -> `video_idea`.
fn camel_to_snake(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 2);
    for ch in field.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
        }
        out.push(ch);
    }
    out.to_lowercase()
}

fn remove_whitespace(field: &str) -> String {
    field.chars().filter(|ch| !ch.is_whitespace()).collect()
}

fn underscores_to_spaces(field: &str) -> String {
    field.replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(name: Option<&str>, strict: bool, schema: Value) -> StructuredOutputSpec {
        StructuredOutputSpec {
            name: name.map(String::from),
            strict,
            schema,
        }
    }

    #[test]
    fn missing_name_gets_default() {
        let fixed = reconcile(&spec(None, false, json!({"type": "object"})));
        assert_eq!(fixed.name.as_deref(), Some(DEFAULT_SCHEMA_NAME));
    }

    #[test]
    fn whitespace_in_name_becomes_underscores() {
        let fixed = reconcile(&spec(Some("my  output\tschema"), false, json!({})));
        assert_eq!(fixed.name.as_deref(), Some("my_output_schema"));
    }

    #[test]
    fn strict_closes_object_nodes() {
        let fixed = reconcile(&spec(
            Some("s"),
            true,
            json!({
                "type": "object",
                "properties": {"a": {"type": "string"}}
            }),
        ));
        assert_eq!(fixed.schema["additionalProperties"], json!(false));
        assert_eq!(fixed.schema["properties"]["a"], json!({"type": "string"}));
    }

    #[test]
    fn strict_closes_nested_objects_through_items() {
        let fixed = reconcile(&spec(
            Some("s"),
            true,
            json!({
                "type": "object",
                "properties": {
                    "entries": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {"x": {"type": "number"}}
                        }
                    }
                }
            }),
        ));
        assert_eq!(
            fixed.schema["properties"]["entries"]["items"]["additionalProperties"],
            json!(false)
        );
    }

    #[test]
    fn strict_leaves_declared_additional_properties_alone() {
        let fixed = reconcile(&spec(
            Some("s"),
            true,
            json!({"type": "object", "additionalProperties": true}),
        ));
        assert_eq!(fixed.schema["additionalProperties"], json!(true));
    }

    #[test]
    fn non_strict_does_not_close_objects() {
        let fixed = reconcile(&spec(Some("s"), false, json!({"type": "object"})));
        assert!(fixed.schema.get("additionalProperties").is_none());
    }

    #[test]
    fn snake_required_repaired_to_camel_property() {
        let fixed = reconcile(&spec(
            Some("s"),
            false,
            json!({
                "type": "object",
                "properties": {"videoIdea": {"type": "string"}},
                "required": ["video_idea"]
            }),
        ));
        assert_eq!(fixed.schema["required"], json!(["videoIdea"]));
    }

    #[test]
    fn camel_required_repaired_to_snake_property() {
        let fixed = reconcile(&spec(
            Some("s"),
            false,
            json!({
                "type": "object",
                "properties": {"video_idea": {"type": "string"}},
                "required": ["videoIdea"]
            }),
        ));
        assert_eq!(fixed.schema["required"], json!(["video_idea"]));
    }

    #[test]
    fn case_insensitive_probe_of_original_name_wins_over_camel_case() {
        // Trial order interleaves case-insensitive probes: the original
        // name's CI match beats the camelCase conversion's exact match.
        let fixed = reconcile(&spec(
            Some("s"),
            false,
            json!({
                "type": "object",
                "properties": {
                    "VIDEO_IDEA": {"type": "string"},
                    "videoIdea": {"type": "string"}
                },
                "required": ["video_idea"]
            }),
        ));
        assert_eq!(fixed.schema["required"], json!(["VIDEO_IDEA"]));
    }

    #[test]
    fn unresolvable_required_entry_is_kept() {
        let fixed = reconcile(&spec(
            Some("s"),
            false,
            json!({
                "type": "object",
                "properties": {"summary": {"type": "string"}},
                "required": ["totally_unrelated"]
            }),
        ));
        assert_eq!(fixed.schema["required"], json!(["totally_unrelated"]));
    }

    #[test]
    fn repair_preserves_entry_positions() {
        let fixed = reconcile(&spec(
            Some("s"),
            false,
            json!({
                "type": "object",
                "properties": {
                    "first": {"type": "string"},
                    "secondField": {"type": "string"},
                    "third": {"type": "string"}
                },
                "required": ["first", "second_field", "third"]
            }),
        ));
        assert_eq!(
            fixed.schema["required"],
            json!(["first", "secondField", "third"])
        );
    }

    #[test]
    fn repair_recurses_into_nested_nodes() {
        let fixed = reconcile(&spec(
            Some("s"),
            false,
            json!({
                "type": "object",
                "properties": {
                    "inner": {
                        "type": "object",
                        "properties": {"someField": {"type": "string"}},
                        "required": ["some_field"]
                    }
                }
            }),
        ));
        assert_eq!(
            fixed.schema["properties"]["inner"]["required"],
            json!(["someField"])
        );
    }

    #[test]
    fn reconcile_is_idempotent() {
        let original = spec(
            Some("My Schema"),
            true,
            json!({
                "type": "object",
                "properties": {
                    "videoIdea": {"type": "string"},
                    "nested": {
                        "type": "object",
                        "properties": {"innerValue": {"type": "number"}},
                        "required": ["inner_value"]
                    }
                },
                "required": ["video_idea", "nested"]
            }),
        );

        let once = reconcile(&original);
        let twice = reconcile(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn reconcile_does_not_mutate_input() {
        let original = spec(Some("My Schema"), true, json!({"type": "object"}));
        let _ = reconcile(&original);
        assert_eq!(original.name.as_deref(), Some("My Schema"));
        assert!(original.schema.get("additionalProperties").is_none());
    }
}
