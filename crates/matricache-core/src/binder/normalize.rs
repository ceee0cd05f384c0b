use serde_json::{Map, Value};

fn has_value(map: &Map<String, Value>, field: &str) -> bool {
    map.get(field).is_some_and(|value| !value.is_null())
}

/// Unwrap a fetcher response into the payload a binder stores.
///
/// Prefers `response.data.results` (paginated envelope), then
/// `response.data`, then the response itself. Returns `None` when the
/// payload is JSON `null`; empty collections and other falsy values are
/// valid payloads.
pub fn normalize(response: Value) -> Option<Value> {
    let payload = match response {
        Value::Object(mut envelope) if has_value(&envelope, "data") => {
            match envelope.remove("data").unwrap_or(Value::Null) {
                Value::Object(mut data) if has_value(&data, "results") => {
                    data.remove("results").unwrap_or(Value::Null)
                }
                data => data,
            }
        }
        other => other,
    };

    if payload.is_null() {
        None
    } else {
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_envelope_shapes() {
        let expected = json!([1, 2, 3]);
        assert_eq!(normalize(json!({"data": {"results": [1, 2, 3]}})), Some(expected.clone()));
        assert_eq!(normalize(json!({"data": [1, 2, 3]})), Some(expected.clone()));
        assert_eq!(normalize(json!([1, 2, 3])), Some(expected));
    }

    #[test]
    fn test_normalize_keeps_pagination_object_without_results() {
        let page = json!({"data": {"count": 0, "next": null}});
        assert_eq!(normalize(page), Some(json!({"count": 0, "next": null})));
    }

    #[test]
    fn test_normalize_null_results_falls_back_to_data() {
        let page = json!({"data": {"results": null, "count": 0}});
        assert_eq!(normalize(page), Some(json!({"results": null, "count": 0})));
    }

    #[test]
    fn test_normalize_null_data_falls_back_to_response() {
        let response = json!({"data": null, "status": 204});
        assert_eq!(normalize(response.clone()), Some(response));
    }

    #[test]
    fn test_normalize_empty_payloads_are_valid() {
        assert_eq!(normalize(json!({"data": {"results": []}})), Some(json!([])));
        assert_eq!(normalize(json!({"data": 0})), Some(json!(0)));
        assert_eq!(normalize(json!("")), Some(json!("")));
    }

    #[test]
    fn test_normalize_null_is_malformed() {
        assert_eq!(normalize(Value::Null), None);
    }
}
