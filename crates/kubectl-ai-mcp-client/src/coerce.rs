// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Argument-key and value coercion applied when invoking a remote tool
//! (§4.5): `snake_case` keys become `camelCase`, and string values are
//! coerced to integer/float or boolean based on heuristics over the
//! parameter name. Coercion failures preserve the original value.

use serde_json::Value;

/// `snake_case` → `camelCase`. Idempotent (§8 property 8): applying it twice
/// yields the same result as applying it once, since a string with no
/// underscores (already camelCase) passes through unchanged.
pub fn snake_to_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for ch in s.chars() {
        if ch == '_' {
            capitalize_next = true;
            continue;
        }
        if capitalize_next {
            out.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn wants_numeric(param_name_lower: &str) -> bool {
    ["number", "count", "total", "max", "min", "limit"]
        .iter()
        .any(|kw| param_name_lower.contains(kw))
}

fn wants_boolean(param_name_lower: &str) -> bool {
    ["is", "has", "needs", "enable"]
        .iter()
        .any(|kw| param_name_lower.starts_with(kw))
        || ["required", "enabled"].iter().any(|kw| param_name_lower.contains(kw))
}

/// Coerce a single string value per the name-based heuristic. Non-string
/// values and coercion failures pass through unchanged.
fn coerce_value(param_name: &str, value: Value) -> Value {
    let Value::String(ref raw) = value else { return value };
    let lower = param_name.to_lowercase();

    if wants_numeric(&lower) {
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Number(i.into());
        }
        if let Ok(f) = raw.parse::<f64>() {
            if let Some(n) = serde_json::Number::from_f64(f) {
                return Value::Number(n);
            }
        }
        return value;
    }
    if wants_boolean(&lower) {
        return match raw.to_lowercase().as_str() {
            "true" | "yes" | "1" => Value::Bool(true),
            "false" | "no" | "0" => Value::Bool(false),
            _ => value,
        };
    }
    value
}

/// Map every argument key to `camelCase` and apply the per-key coercion
/// heuristic to its value (§4.5). Non-object input is returned unchanged.
pub fn coerce_arguments(args: &Value) -> Value {
    let Value::Object(map) = args else { return args.clone() };
    let mut out = serde_json::Map::with_capacity(map.len());
    for (key, value) in map {
        let camel_key = snake_to_camel(key);
        let coerced = coerce_value(key, value.clone());
        out.insert(camel_key, coerced);
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snake_to_camel_basic() {
        assert_eq!(snake_to_camel("pod_name"), "podName");
        assert_eq!(snake_to_camel("max_count"), "maxCount");
        assert_eq!(snake_to_camel("already_camel_ish"), "alreadyCamelIsh");
    }

    #[test]
    fn snake_to_camel_idempotent() {
        for s in ["pod_name", "podName", "a_b_c", "plain"] {
            let once = snake_to_camel(s);
            let twice = snake_to_camel(&once);
            assert_eq!(once, twice, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn coerces_numeric_by_name() {
        let args = json!({"max_count": "5", "min_limit": "2.5"});
        let out = coerce_arguments(&args);
        assert_eq!(out["maxCount"], json!(5));
        assert_eq!(out["minLimit"], json!(2.5));
    }

    #[test]
    fn coerces_boolean_by_name_prefix() {
        let args = json!({"is_ready": "true", "has_owner": "false"});
        let out = coerce_arguments(&args);
        assert_eq!(out["isReady"], json!(true));
        assert_eq!(out["hasOwner"], json!(false));
    }

    #[test]
    fn coerces_boolean_by_name_substring() {
        let args = json!({"field_required": "yes", "feature_enabled": "no"});
        let out = coerce_arguments(&args);
        assert_eq!(out["fieldRequired"], json!(true));
        assert_eq!(out["featureEnabled"], json!(false));
    }

    #[test]
    fn unrecognized_name_is_left_as_string() {
        let args = json!({"pod_name": "nginx"});
        let out = coerce_arguments(&args);
        assert_eq!(out["podName"], json!("nginx"));
    }

    #[test]
    fn coercion_failure_preserves_original_value() {
        let args = json!({"max_count": "not-a-number"});
        let out = coerce_arguments(&args);
        assert_eq!(out["maxCount"], json!("not-a-number"));
    }

    #[test]
    fn non_object_arguments_pass_through() {
        let args = json!("not an object");
        assert_eq!(coerce_arguments(&args), args);
    }
}
