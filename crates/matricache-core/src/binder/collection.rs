//! Pure list edits behind the binder's optimistic `remove` and `update`.
//!
//! Both return `None` when nothing changes (not a list, or no item matches)
//! so the binder can skip the write entirely.

use serde_json::Value;

/// Strict id comparison. Numbers compare by value so that `1` matches `1.0`.
pub fn ids_match(candidate: &Value, id: &Value) -> bool {
    match (candidate, id) {
        (Value::Number(a), Value::Number(b)) => a == b || a.as_f64() == b.as_f64(),
        _ => candidate == id,
    }
}

fn item_matches(item: &Value, id_field: &str, id: &Value) -> bool {
    item.get(id_field)
        .is_some_and(|candidate| ids_match(candidate, id))
}

/// Drop every item whose `id_field` equals `id`, keeping survivors in order.
pub fn remove_matching(data: &Value, id_field: &str, id: &Value) -> Option<Value> {
    let items = data.as_array()?;
    let survivors: Vec<Value> = items
        .iter()
        .filter(|item| !item_matches(item, id_field, id))
        .cloned()
        .collect();

    if survivors.len() == items.len() {
        None
    } else {
        Some(Value::Array(survivors))
    }
}

/// Shallow-merge `patch` into every item whose `id_field` equals `id`.
/// Only object patches are applied. The result is a new list in which
/// non-matching items are equal copies of the originals.
pub fn patch_matching(data: &Value, id_field: &str, id: &Value, patch: &Value) -> Option<Value> {
    let items = data.as_array()?;
    let patch = patch.as_object()?;

    let mut changed = false;
    let patched: Vec<Value> = items
        .iter()
        .map(|item| match item.as_object() {
            Some(fields) if item_matches(item, id_field, id) => {
                changed = true;
                let mut merged = fields.clone();
                for (field, value) in patch {
                    merged.insert(field.clone(), value.clone());
                }
                Value::Object(merged)
            }
            _ => item.clone(),
        })
        .collect();

    changed.then_some(Value::Array(patched))
}
