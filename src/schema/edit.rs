//! Applies side-panel field edits to the raw events array.

use serde_json::{Map, Number, Value};

use super::parser::PRIVATE_DATA_KEYS;
use crate::error::AppError;
use crate::models::{is_excluded_key, FieldEdit};

/// Writes `edit` into every entry of `events` that carries the element id:
/// events (`@id`), participants (`@id`) and child entries (`child`).
///
/// The new value is coerced to the type of the value it replaces, so
/// editing a boolean keeps it a boolean.
pub fn apply_edit(events: &mut Value, edit: &FieldEdit) -> Result<(), AppError> {
    if is_excluded_key(&edit.key) {
        return Err(AppError::ReadOnlyField(edit.key.clone()));
    }
    let events = events
        .as_array_mut()
        .ok_or_else(|| AppError::Schema("document is not an events array".to_string()))?;

    let mut applied = 0usize;
    for event in events.iter_mut() {
        let Some(obj) = event.as_object_mut() else {
            continue;
        };
        if has_str(obj, "@id", &edit.id) {
            set_field(obj, &edit.key, &edit.value);
            applied += 1;
        }
        if let Some(participants) = obj.get_mut("participants").and_then(Value::as_array_mut) {
            for participant in participants.iter_mut().filter_map(Value::as_object_mut) {
                if has_str(participant, "@id", &edit.id) {
                    set_field(participant, &edit.key, &edit.value);
                    applied += 1;
                }
            }
        }
        if let Some(children) = obj.get_mut("children").and_then(Value::as_array_mut) {
            for child in children.iter_mut().filter_map(Value::as_object_mut) {
                if has_str(child, "child", &edit.id) {
                    set_field(child, &edit.key, &edit.value);
                    applied += 1;
                }
            }
        }
    }

    if applied == 0 {
        return Err(AppError::ElementNotFound(edit.id.clone()));
    }
    tracing::debug!(id = %edit.id, key = %edit.key, applied, "applied field edit");
    Ok(())
}

fn has_str(obj: &Map<String, Value>, key: &str, expected: &str) -> bool {
    obj.get(key).and_then(Value::as_str) == Some(expected)
}

fn set_field(obj: &mut Map<String, Value>, key: &str, raw: &str) {
    if !obj.contains_key(key) {
        let private_holds_key = obj
            .get("privateData")
            .and_then(Value::as_object)
            .is_some_and(|p| p.contains_key(key));
        if private_holds_key || PRIVATE_DATA_KEYS.contains(&key) {
            let private = obj
                .entry("privateData")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(private) = private.as_object_mut() {
                let value = coerce(private.get(key), raw);
                private.insert(key.to_string(), value);
                return;
            }
        }
    }
    let value = coerce(obj.get(key), raw);
    obj.insert(key.to_string(), value);
}

/// Parses `raw` into the JSON type of `existing`; anything unparseable stays a string.
fn coerce(existing: Option<&Value>, raw: &str) -> Value {
    let trimmed = raw.trim();
    match existing {
        Some(Value::Bool(_)) => trimmed
            .parse::<bool>()
            .map(Value::Bool)
            .unwrap_or_else(|_| Value::from(raw)),
        Some(Value::Number(_)) => {
            if let Ok(int) = trimmed.parse::<i64>() {
                Value::from(int)
            } else if let Some(num) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
                Value::Number(num)
            } else {
                Value::from(raw)
            }
        }
        Some(Value::Array(_)) => Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Value::from)
                .collect(),
        ),
        _ => Value::from(raw),
    }
}
