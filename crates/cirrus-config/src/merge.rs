//! Recursive last-wins object merge. A single first-matching-loader-wins
//! pick isn't enough for layered config — every layer needs to contribute,
//! with a later layer's keys overriding an earlier layer's, so a deployment
//! can set one field in its TOML file without having to restate everything
//! env already supplied.

use serde_json::Value;

pub fn merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlay_keys_override_base_keys_at_every_depth() {
        let base = json!({"execution": {"max_steps": 50, "max_duration_ms": 300_000}});
        let overlay = json!({"execution": {"max_steps": 10}});
        let merged = merge(base, overlay);
        assert_eq!(merged, json!({"execution": {"max_steps": 10, "max_duration_ms": 300_000}}));
    }

    #[test]
    fn empty_overlay_leaves_base_untouched() {
        let base = json!({"guardrails": {"pii_redaction_enabled": true}});
        let merged = merge(base.clone(), json!({}));
        assert_eq!(merged, base);
    }
}
