//! Lenient field extraction from upstream JSON.
//!
//! Upstream payloads drift: numbers arrive as strings, strings go missing and
//! arrays turn up empty or as `null`. These helpers read what is there and
//! return `None` for everything else, so normalization never fails.

use std::collections::BTreeMap;

use serde_json::Value;

/// Non-blank string at `key`, trimmed. Numbers and booleans are rendered.
pub(crate) fn text(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(scalar_text)
}

/// Non-blank string form of a scalar JSON value.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    let rendered = match value {
        Value::String(text) => text.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!rendered.is_empty()).then_some(rendered)
}

/// Finite float at `key`, accepting numeric strings.
pub(crate) fn number(value: &Value, key: &str) -> Option<f64> {
    let parsed = match value.get(key)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|candidate: &f64| candidate.is_finite())
}

/// Non-negative integer at `key`, accepting numeric strings.
pub(crate) fn unsigned(value: &Value, key: &str) -> Option<u64> {
    match value.get(key)? {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Elements of the array at `key`; empty when absent or not an array.
pub(crate) fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Non-blank strings in the array at `key`.
pub(crate) fn text_list(value: &Value, key: &str) -> Vec<String> {
    array(value, key).iter().filter_map(scalar_text).collect()
}

/// Scalar members of the object at `key`, rendered as strings.
pub(crate) fn text_map(value: &Value, key: &str) -> BTreeMap<String, String> {
    value
        .get(key)
        .and_then(Value::as_object)
        .map(|object| {
            object
                .iter()
                .filter_map(|(name, member)| scalar_text(member).map(|text| (name.clone(), text)))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!({"name": "  Robin "}), Some("Robin"))]
    #[case(json!({"name": 7}), Some("7"))]
    #[case(json!({"name": ""}), None)]
    #[case(json!({"name": null}), None)]
    #[case(json!({}), None)]
    fn text_reads_scalars(#[case] value: Value, #[case] expected: Option<&str>) {
        assert_eq!(text(&value, "name").as_deref(), expected);
    }

    #[rstest]
    #[case(json!({"lat": 40.5}), Some(40.5))]
    #[case(json!({"lat": "40.5"}), Some(40.5))]
    #[case(json!({"lat": "north"}), None)]
    #[case(json!({"lat": "NaN"}), None)]
    fn number_accepts_numeric_strings(#[case] value: Value, #[case] expected: Option<f64>) {
        assert_eq!(number(&value, "lat"), expected);
    }

    #[rstest]
    #[case(json!({"howMany": 3}), Some(3))]
    #[case(json!({"howMany": "12"}), Some(12))]
    #[case(json!({"howMany": "X"}), None)]
    #[case(json!({"howMany": -1}), None)]
    fn unsigned_reads_counts(#[case] value: Value, #[case] expected: Option<u64>) {
        assert_eq!(unsigned(&value, "howMany"), expected);
    }

    #[rstest]
    fn collections_degrade_to_empty() {
        let value = json!({"locations": null, "taxonomy": "n/a"});
        assert!(text_list(&value, "locations").is_empty());
        assert!(text_map(&value, "taxonomy").is_empty());
    }

    #[rstest]
    fn text_map_renders_scalar_members() {
        let value = json!({"characteristics": {"diet": "Carnivore", "top_speed": 120, "prey": ["gazelle"]}});
        let map = text_map(&value, "characteristics");
        assert_eq!(map.get("diet").map(String::as_str), Some("Carnivore"));
        assert_eq!(map.get("top_speed").map(String::as_str), Some("120"));
        assert!(!map.contains_key("prey"));
    }
}
