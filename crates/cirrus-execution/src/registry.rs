//! Tool registry: closed-world per process, read-mostly, shared across runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cirrus_error::CirrusError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ToolCategory {
    Compute,
    Networking,
    Storage,
    Database,
    Identity,
    Observability,
    Pricing,
    Search,
    Billing,
    Logging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalLevel {
    Auto,
    Confirm,
    Danger,
}

/// The external capability a tool delegates to. No concrete cloud SDK
/// binding is carried here — this trait is the seam one would implement.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, tool_name: &str, args: &Value, cancellation: CancellationToken) -> Result<Value, CirrusError>;
}

/// Immutable once registered. `parameter_schema` is validated against `args`
/// before every invocation in [`crate::executor`].
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub category: ToolCategory,
    pub approval_level: ApprovalLevel,
    pub parameter_schema: Value,
}

pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
    invoker: Arc<dyn ToolInvoker>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new(invoker: Arc<dyn ToolInvoker>) -> Self {
        Self { tools: HashMap::new(), invoker }
    }

    #[must_use]
    pub fn register(mut self, def: ToolDefinition) -> Self {
        self.tools.insert(def.name.clone(), def);
        self
    }

    pub fn resolve(&self, name: &str) -> Result<&ToolDefinition, CirrusError> {
        self.tools.get(name).ok_or_else(|| CirrusError::not_found("unknown_tool", format!("tool '{name}' is not registered")))
    }

    #[must_use]
    pub fn invoker(&self) -> Arc<dyn ToolInvoker> {
        self.invoker.clone()
    }
}

/// Validates `args` against `schema`'s required top-level keys. A full JSON
/// Schema validator is out of scope for this core; this checks the
/// invariant that actually matters — parameter validation before
/// invocation — not arbitrary schema constraints.
pub fn validate_args(schema: &Value, args: &Value) -> Result<(), CirrusError> {
    let Some(required) = schema.get("required").and_then(Value::as_array) else {
        return Ok(());
    };
    for key in required {
        let Some(key) = key.as_str() else { continue };
        if args.get(key).is_none() {
            return Err(CirrusError::validation("missing_parameter", format!("missing required parameter '{key}'")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoInvoker;

    #[async_trait]
    impl ToolInvoker for EchoInvoker {
        async fn invoke(&self, _tool_name: &str, args: &Value, _cancellation: CancellationToken) -> Result<Value, CirrusError> {
            Ok(args.clone())
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(Arc::new(EchoInvoker)).register(ToolDefinition {
            name: "listInstances".into(),
            category: ToolCategory::Compute,
            approval_level: ApprovalLevel::Auto,
            parameter_schema: json!({}),
        })
    }

    #[test]
    fn resolve_known_tool() {
        let registry = registry();
        assert_eq!(registry.resolve("listInstances").unwrap().category, ToolCategory::Compute);
    }

    #[test]
    fn resolve_unknown_tool_is_not_found() {
        let registry = registry();
        let err = registry.resolve("nope").unwrap_err();
        assert_eq!(err.kind(), cirrus_error::ErrorKind::NotFound);
    }

    #[test]
    fn validate_args_rejects_missing_required_field() {
        let schema = json!({"required": ["name"]});
        let err = validate_args(&schema, &json!({})).unwrap_err();
        assert_eq!(err.code(), "missing_parameter");
    }

    #[test]
    fn validate_args_accepts_satisfied_schema() {
        let schema = json!({"required": ["name"]});
        assert!(validate_args(&schema, &json!({"name": "B"})).is_ok());
    }
}
