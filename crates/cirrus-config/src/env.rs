//! Flat environment overlay: a prefix/separator-driven nested JSON builder
//! with `is_sensitive_key` redaction on log, trimmed to the small, known key
//! set this core reads. There is no nesting to reconstruct, so
//! `parse_env_value` only needs bool/int/string, not a full object/array/CSV
//! dialect.

use serde_json::Value;

const PREFIX: &str = "CIRRUS_";

const KEYS: &[(&str, &[&str])] = &[
    ("MAX_STEPS", &["execution", "max_steps"]),
    ("MAX_DURATION_MS", &["execution", "max_duration_ms"]),
    ("APPROVAL_TTL_MS", &["execution", "approval_ttl_ms"]),
    ("MAX_INPUT_CHARS", &["guardrails", "max_input_chars"]),
    ("INJECTION_DETECTION_ENABLED", &["guardrails", "injection_detection_enabled"]),
    ("PII_REDACTION_ENABLED", &["guardrails", "pii_redaction_enabled"]),
    ("TOKEN_LIMIT_ENABLED", &["guardrails", "token_limit_enabled"]),
];

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    ["password", "secret", "token", "api_key", "private", "credential"].iter().any(|needle| lower.contains(needle))
}

fn parse_env_value(raw: &str) -> Value {
    if let Ok(b) = raw.parse::<bool>() {
        return Value::Bool(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(i.into());
    }
    Value::String(raw.to_string())
}

fn insert_nested(root: &mut Value, path: &[&str], value: Value) {
    let mut cursor = root;
    for segment in &path[..path.len() - 1] {
        let object = cursor.as_object_mut().expect("root layers are always objects");
        cursor = object.entry((*segment).to_string()).or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    if let Some(object) = cursor.as_object_mut() {
        object.insert(path[path.len() - 1].to_string(), value);
    }
}

/// Reads `CIRRUS_*` environment variables into a sparse overlay: only keys
/// actually present in the environment are included, so merging this over a
/// lower layer never clobbers a setting the deployment didn't touch.
pub fn load() -> Value {
    let mut overlay = Value::Object(serde_json::Map::new());
    for (suffix, path) in KEYS {
        let var_name = format!("{PREFIX}{suffix}");
        let Ok(raw) = std::env::var(&var_name) else { continue };
        if is_sensitive_key(suffix) {
            tracing::trace!(key = %var_name, value = "[REDACTED]", "config overlay from environment");
        } else {
            tracing::trace!(key = %var_name, value = %raw, "config overlay from environment");
        }
        insert_nested(&mut overlay, path, parse_env_value(&raw));
    }
    overlay
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_booleans_and_integers_and_falls_back_to_string() {
        assert_eq!(parse_env_value("true"), Value::Bool(true));
        assert_eq!(parse_env_value("42"), Value::Number(42.into()));
        assert_eq!(parse_env_value("anthropic"), Value::String("anthropic".into()));
    }

    #[test]
    fn insert_nested_builds_intermediate_objects() {
        let mut root = Value::Object(serde_json::Map::new());
        insert_nested(&mut root, &["execution", "max_steps"], Value::Number(7.into()));
        assert_eq!(root["execution"]["max_steps"], Value::Number(7.into()));
    }

    #[test]
    fn sensitive_key_detection_matches_common_secret_shapes() {
        assert!(is_sensitive_key("API_KEY"));
        assert!(is_sensitive_key("approval_token"));
        assert!(!is_sensitive_key("MAX_STEPS"));
    }
}
