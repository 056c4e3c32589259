//! The single tool-invocation path shared by the workflow `tool` node
//! dispatch (agent context — gated upstream by an explicit `approval` node
//! in the DAG) and the standalone `/tools/execute` HTTP surface (API
//! context — gated inline by an approval token), plus a chat session's
//! mid-stream tool calls. Every successful invocation and approval consumption
//! through this path is written to the audit sink.

use cirrus_core::ToolCallId;
use cirrus_error::CirrusError;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::approval::ApprovalStore;
use crate::audit::{redact_tool_args, write_best_effort, AuditEntry, AuditSink};
use crate::registry::{validate_args, ApprovalLevel, ToolRegistry};

pub enum InvocationContext {
    /// Called from inside a DAG run. Approval, if required, was already
    /// granted by an upstream `approval` node suspending and resuming.
    Workflow,
    /// Called directly via the external tool-invocation API or a chat
    /// session. `danger`-level tools additionally require
    /// `has_admin_permission`.
    Api { tool_call_id: ToolCallId, has_admin_permission: bool },
}

pub async fn invoke_tool(
    registry: &ToolRegistry,
    approval_store: &ApprovalStore,
    audit: &dyn AuditSink,
    tool_name: &str,
    args: &Value,
    context: InvocationContext,
    cancellation: CancellationToken,
) -> Result<Value, CirrusError> {
    let def = registry.resolve(tool_name)?;
    validate_args(&def.parameter_schema, args)?;

    if let InvocationContext::Api { tool_call_id, has_admin_permission } = context {
        match def.approval_level {
            ApprovalLevel::Auto => {}
            ApprovalLevel::Confirm => require_approval(approval_store, audit, tool_call_id, tool_name).await?,
            ApprovalLevel::Danger => {
                if !has_admin_permission {
                    return Err(CirrusError::forbidden("admin_permission_required", "this action requires a high-privilege permission, not merely tool execution"));
                }
                require_approval(approval_store, audit, tool_call_id, tool_name).await?;
            }
        }
    }

    let result = registry.invoker().invoke(tool_name, args, cancellation).await?;
    write_best_effort(audit, AuditEntry::ToolInvoked { run_id: None, tool_name: tool_name.to_string(), redacted_args: redact_tool_args(args) }).await;
    Ok(result)
}

async fn require_approval(approval_store: &ApprovalStore, audit: &dyn AuditSink, tool_call_id: ToolCallId, tool_name: &str) -> Result<(), CirrusError> {
    if approval_store.consume(tool_call_id, tool_name) {
        write_best_effort(audit, AuditEntry::ApprovalConsumed { tool_call_id: tool_call_id.to_string(), tool_name: tool_name.to_string() }).await;
        Ok(())
    } else {
        Err(CirrusError::forbidden("approval_required", "this action requires a valid, unexpired approval"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::NoopAuditSink;
    use crate::registry::{ToolCategory, ToolDefinition, ToolInvoker};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoInvoker;

    #[async_trait]
    impl ToolInvoker for EchoInvoker {
        async fn invoke(&self, _tool_name: &str, args: &Value, _cancellation: CancellationToken) -> Result<Value, CirrusError> {
            Ok(args.clone())
        }
    }

    fn registry_with(name: &str, level: ApprovalLevel) -> ToolRegistry {
        ToolRegistry::new(Arc::new(EchoInvoker)).register(ToolDefinition { name: name.to_string(), category: ToolCategory::Compute, approval_level: level, parameter_schema: serde_json::json!({}) })
    }

    #[tokio::test]
    async fn workflow_context_bypasses_approval_check() {
        let registry = registry_with("terminateInstance", ApprovalLevel::Danger);
        let store = ApprovalStore::new();
        let result = invoke_tool(&registry, &store, &NoopAuditSink, "terminateInstance", &serde_json::json!({}), InvocationContext::Workflow, CancellationToken::new()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn api_context_confirm_requires_consumed_approval() {
        let registry = registry_with("deleteBucket", ApprovalLevel::Confirm);
        let store = ApprovalStore::new();
        let tc = ToolCallId::v4();

        let denied = invoke_tool(&registry, &store, &NoopAuditSink, "deleteBucket", &serde_json::json!({}), InvocationContext::Api { tool_call_id: tc, has_admin_permission: false }, CancellationToken::new()).await;
        assert_eq!(denied.unwrap_err().code(), "approval_required");

        store.record(tc, "deleteBucket", None);
        let allowed = invoke_tool(&registry, &store, &NoopAuditSink, "deleteBucket", &serde_json::json!({}), InvocationContext::Api { tool_call_id: tc, has_admin_permission: false }, CancellationToken::new()).await;
        assert!(allowed.is_ok());
    }

    #[tokio::test]
    async fn api_context_danger_requires_admin_permission_even_with_approval() {
        let registry = registry_with("terminateInstance", ApprovalLevel::Danger);
        let store = ApprovalStore::new();
        let tc = ToolCallId::v4();
        store.record(tc, "terminateInstance", None);

        let denied = invoke_tool(&registry, &store, &NoopAuditSink, "terminateInstance", &serde_json::json!({}), InvocationContext::Api { tool_call_id: tc, has_admin_permission: false }, CancellationToken::new()).await;
        assert_eq!(denied.unwrap_err().code(), "admin_permission_required");
    }
}
