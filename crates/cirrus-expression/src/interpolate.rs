//! `{{path.dot}}` template interpolation, independent of the expression
//! grammar: a bare textual scan for `{{ ... }}`, not a parsed expression.

use serde_json::Value;

use crate::ast::PathSegment;
use crate::eval::walk_path;

/// Replace every `{{path}}` occurrence in `template` by walking `path` over
/// `context` and stringifying the terminal value. A path that resolves to
/// nothing leaves the literal placeholder untouched.
#[must_use]
pub fn interpolate(template: &str, context: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                let path_src = after_open[..end].trim();
                match stringify_path(path_src, context) {
                    Some(rendered) => out.push_str(&rendered),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after_open[end + 2..];
            }
            None => {
                // Unterminated placeholder: treat the rest as literal text.
                out.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn stringify_path(path_src: &str, context: &Value) -> Option<String> {
    let segments = parse_dot_path(path_src)?;
    let value = walk_path(context, &segments);
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn parse_dot_path(src: &str) -> Option<Vec<PathSegment>> {
    if src.is_empty() {
        return None;
    }
    Some(src.split('.').map(|part| PathSegment::Field(part.to_string())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_known_path() {
        let ctx = json!({"t1": {"instances": [{"id": "i-1"}]}});
        assert_eq!(interpolate("id is {{t1.id}}", &ctx), "id is {{t1.id}}");
    }

    #[test]
    fn substitutes_scalar_value() {
        let ctx = json!({"region": "phx"});
        assert_eq!(interpolate("deploy to {{region}}", &ctx), "deploy to phx");
    }

    #[test]
    fn missing_path_leaves_placeholder() {
        let ctx = json!({});
        assert_eq!(interpolate("value: {{missing.path}}", &ctx), "value: {{missing.path}}");
    }

    #[test]
    fn multiple_placeholders() {
        let ctx = json!({"a": "1", "b": "2"});
        assert_eq!(interpolate("{{a}}-{{b}}", &ctx), "1-2");
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        let ctx = json!({});
        assert_eq!(interpolate("hello {{unterminated", &ctx), "hello {{unterminated");
    }
}
