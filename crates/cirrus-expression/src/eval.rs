//! Evaluator. Bounded by construction: no loop or recursion constructs exist
//! in the grammar, so the only runaway risk is a pathologically large AST —
//! guarded by a wall-clock budget checked at every node.

use std::time::{Duration, Instant};

use cirrus_error::CirrusError;
use serde_json::Value;

use crate::ast::{BinaryOp, Expr, PathSegment, UnaryOp};

/// Evaluation time is bounded to 10 ms per call.
pub const MAX_EVAL_DURATION: Duration = Duration::from_millis(10);

struct Budget {
    deadline: Instant,
}

impl Budget {
    fn check(&self) -> Result<(), CirrusError> {
        if Instant::now() >= self.deadline {
            return Err(CirrusError::validation("expression_timeout", "expression evaluation exceeded its time budget"));
        }
        Ok(())
    }
}

/// Evaluate `expr` against `context`. Unknown identifiers resolve to `null`
/// (spec: "undefined"), never an error — only malformed syntax or a call to
/// a non-allow-listed function fails.
pub fn eval(expr: &Expr, context: &Value) -> Result<Value, CirrusError> {
    let budget = Budget { deadline: Instant::now() + MAX_EVAL_DURATION };
    eval_inner(expr, context, &budget)
}

fn eval_inner(expr: &Expr, context: &Value, budget: &Budget) -> Result<Value, CirrusError> {
    budget.check()?;
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Path(segments) => Ok(walk_path(context, segments)),
        Expr::Unary(op, inner) => {
            let v = eval_inner(inner, context, budget)?;
            Ok(match op {
                UnaryOp::Not => Value::Bool(!truthy(&v)),
                UnaryOp::Neg => Value::from(-as_number(&v)?),
            })
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, context, budget),
        Expr::Call(name, args) => {
            let values = args
                .iter()
                .map(|a| eval_inner(a, context, budget))
                .collect::<Result<Vec<_>, _>>()?;
            call_builtin(name, &values)
        }
    }
}

fn eval_binary(op: BinaryOp, lhs: &Expr, rhs: &Expr, context: &Value, budget: &Budget) -> Result<Value, CirrusError> {
    // Short-circuit && / || without evaluating the untaken side.
    if op == BinaryOp::And {
        let l = eval_inner(lhs, context, budget)?;
        if !truthy(&l) {
            return Ok(Value::Bool(false));
        }
        let r = eval_inner(rhs, context, budget)?;
        return Ok(Value::Bool(truthy(&r)));
    }
    if op == BinaryOp::Or {
        let l = eval_inner(lhs, context, budget)?;
        if truthy(&l) {
            return Ok(Value::Bool(true));
        }
        let r = eval_inner(rhs, context, budget)?;
        return Ok(Value::Bool(truthy(&r)));
    }

    let l = eval_inner(lhs, context, budget)?;
    let r = eval_inner(rhs, context, budget)?;
    Ok(match op {
        BinaryOp::Eq => Value::Bool(l == r),
        BinaryOp::Ne => Value::Bool(l != r),
        BinaryOp::Lt => Value::Bool(as_number(&l)? < as_number(&r)?),
        BinaryOp::Le => Value::Bool(as_number(&l)? <= as_number(&r)?),
        BinaryOp::Gt => Value::Bool(as_number(&l)? > as_number(&r)?),
        BinaryOp::Ge => Value::Bool(as_number(&l)? >= as_number(&r)?),
        BinaryOp::Add => Value::from(as_number(&l)? + as_number(&r)?),
        BinaryOp::Sub => Value::from(as_number(&l)? - as_number(&r)?),
        BinaryOp::Mul => Value::from(as_number(&l)? * as_number(&r)?),
        BinaryOp::Div => Value::from(as_number(&l)? / as_number(&r)?),
        BinaryOp::Rem => Value::from(as_number(&l)? % as_number(&r)?),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    })
}

fn call_builtin(name: &str, args: &[Value]) -> Result<Value, CirrusError> {
    match name {
        "length" => {
            let v = args.first().ok_or_else(|| CirrusError::validation("bad_args", "length() requires one argument"))?;
            let len = match v {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                Value::Null => 0,
                _ => return Err(CirrusError::validation("bad_args", "length() requires a string, array, or object")),
            };
            Ok(Value::from(len as i64))
        }
        "contains" => {
            let haystack = args.first().ok_or_else(|| CirrusError::validation("bad_args", "contains() requires two arguments"))?;
            let needle = args.get(1).ok_or_else(|| CirrusError::validation("bad_args", "contains() requires two arguments"))?;
            let found = match haystack {
                Value::String(s) => needle.as_str().is_some_and(|n| s.contains(n)),
                Value::Array(a) => a.contains(needle),
                _ => return Err(CirrusError::validation("bad_args", "contains() requires a string or array")),
            };
            Ok(Value::Bool(found))
        }
        "startsWith" => str_predicate(args, "startsWith", str::starts_with),
        "endsWith" => str_predicate(args, "endsWith", str::ends_with),
        _ => Err(CirrusError::validation("unknown_function", format!("'{name}' is not in the evaluator's allow-list"))),
    }
}

fn str_predicate(args: &[Value], name: &str, f: impl Fn(&str, &str) -> bool) -> Result<Value, CirrusError> {
    let s = args.first().and_then(Value::as_str).ok_or_else(|| CirrusError::validation("bad_args", format!("{name}() requires a string as the first argument")))?;
    let prefix = args.get(1).and_then(Value::as_str).ok_or_else(|| CirrusError::validation("bad_args", format!("{name}() requires a string as the second argument")))?;
    Ok(Value::Bool(f(s, prefix)))
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn as_number(v: &Value) -> Result<f64, CirrusError> {
    v.as_f64().ok_or_else(|| CirrusError::validation("type_error", format!("expected a number, found {v}")))
}

/// Walk a dot/bracket path against `context`. Missing segments resolve to
/// `null` ("undefined") rather than erroring.
pub fn walk_path(context: &Value, segments: &[PathSegment]) -> Value {
    let mut current = context;
    for segment in segments {
        current = match (current, segment) {
            (Value::Object(map), PathSegment::Field(name)) => match map.get(name) {
                Some(v) => v,
                None => return Value::Null,
            },
            (Value::Array(arr), PathSegment::Index(i)) => {
                let idx = usize::try_from(*i).ok();
                match idx.and_then(|i| arr.get(i)) {
                    Some(v) => v,
                    None => return Value::Null,
                }
            }
            _ => return Value::Null,
        };
    }
    current.clone()
}
