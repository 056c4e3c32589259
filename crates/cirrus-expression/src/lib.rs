//! A sandboxed evaluator for condition/loop/break expressions and `{{path}}`
//! prompt interpolation.
//!
//! This is deliberately **not** a general-purpose expression language: there
//! is no way to define a function, no loop construct, and no way to call
//! anything outside [`parser::ALLOWED_FUNCTIONS`]. Every expression
//! terminates in bounded time by construction, reinforced by a 10ms wall-clock
//! budget in [`eval::eval`] as a backstop.

pub mod ast;
pub mod eval;
pub mod interpolate;
pub mod lexer;
pub mod parser;

use cirrus_error::CirrusError;
use serde_json::Value;

pub use interpolate::interpolate;
pub use parser::ALLOWED_FUNCTIONS;

/// Parse and evaluate `source` against `context` in one call.
pub fn evaluate(source: &str, context: &Value) -> Result<Value, CirrusError> {
    let expr = parser::Parser::parse(source).map_err(|e| CirrusError::validation("expression_parse_error", e))?;
    eval::eval(&expr, context)
}

/// Evaluate and coerce the result to a boolean via the same truthiness rule
/// used for `&&`/`||`. Used for `condition` and loop `breakCondition` nodes.
pub fn evaluate_bool(source: &str, context: &Value) -> Result<bool, CirrusError> {
    let value = evaluate(source, context)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evaluate_bool_on_condition_expression() {
        let ctx = json!({"input": {"region": "phx"}});
        assert!(evaluate_bool("input.region == \"phx\"", &ctx).unwrap());
    }

    #[test]
    fn parse_error_surfaces_as_validation() {
        let err = evaluate("1 +", &Value::Null).unwrap_err();
        assert_eq!(err.kind(), cirrus_error::ErrorKind::Validation);
    }
}
