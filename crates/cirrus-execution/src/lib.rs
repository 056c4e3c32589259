//! The core execution runtime: DAG traversal, the approval gate, the
//! compensation stack, and the progress stream bus. `RunSupervisor` is the
//! glue: it drives a `WorkflowExecutor` to completion, bridging its
//! suspend/resume boundary to the `ApprovalStore`'s pending-continuation
//! wait, and replays compensation on any post-tool-success failure that
//! isn't a validation rejection.

pub mod approval;
pub mod audit;
pub mod budget;
pub mod compensation;
pub mod executor;
pub mod invocation;
pub mod language_model;
pub mod registry;
pub mod result_cache;
pub mod retry;
pub mod run;
pub mod stream_bus;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use cirrus_core::{OrgId, RunId};
use cirrus_error::ErrorKind;
use cirrus_workflow::WorkflowDefinition;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::approval::ApprovalStore;
use crate::audit::{write_best_effort, AuditEntry, AuditSink};
use crate::budget::APPROVAL_TTL_MS;
use crate::compensation::CompensationStack;
use crate::executor::WorkflowExecutor;
use crate::run::{EngineState, ExecutionOutcome};

/// The outcome a caller outside the executor actually cares about: whether
/// the run finished (with or without a compensated rollback), is waiting on
/// a human, or is still blocked on a specific pending approval.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed { step_results: serde_json::Map<String, Value>, output: Value },
    /// The run failed and, if any tool had already succeeded and the failure
    /// was not a validation rejection, its compensations were replayed
    /// best-effort.
    Failed { error: String, step_results: serde_json::Map<String, Value>, compensation: Option<compensation::CompensationSummary> },
    /// Suspended waiting on a human decision that never arrived before the
    /// caller's own wait budget elapsed; `engine_state` is the resumption
    /// cookie for a later `resume_run` call once it does.
    AwaitingApproval { engine_state: EngineState },
}

/// Drives a `WorkflowExecutor` across its suspend/resume boundary, owning
/// the pieces an executor run alone can't: approval wait/resolve and
/// compensation replay. One instance is shared across all runs in a process.
pub struct RunSupervisor {
    executor: WorkflowExecutor,
    approvals: Arc<ApprovalStore>,
    audit: Arc<dyn AuditSink>,
}

impl RunSupervisor {
    #[must_use]
    pub fn new(executor: WorkflowExecutor, approvals: Arc<ApprovalStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { executor, approvals, audit }
    }

    /// Run `def` from its `input` node forward, blocking on each `approval`
    /// node up to `approval_wait` before giving up and returning
    /// `AwaitingApproval`. On a non-validation failure after at least one
    /// tool succeeded, replays the compensation stack before returning.
    pub async fn run(&self, def: &WorkflowDefinition, run_id: RunId, org_id: OrgId, input: Value, approval_wait: Duration, cancellation: CancellationToken) -> RunOutcome {
        write_best_effort(self.audit.as_ref(), AuditEntry::RunStarted { run_id, org_id, workflow_id: def.id.to_string() }).await;

        let mut compensation = CompensationStack::new();
        let outcome = self.executor.execute(def, run_id, input, &mut compensation, cancellation.clone()).await;
        self.drive(def, run_id, org_id, outcome, compensation, approval_wait, cancellation).await
    }

    /// Resume a previously `AwaitingApproval` run once the decision finally
    /// arrives, or after the caller independently confirms approval out of
    /// band (e.g. polling `ApprovalStore::pending`).
    pub async fn resume(&self, def: &WorkflowDefinition, run_id: RunId, org_id: OrgId, engine_state: EngineState, input: Value, approval_wait: Duration, cancellation: CancellationToken) -> RunOutcome {
        let mut compensation = CompensationStack::new();
        let outcome = self.executor.resume(def, run_id, engine_state, input, &mut compensation, cancellation.clone()).await;
        self.drive(def, run_id, org_id, outcome, compensation, approval_wait, cancellation).await
    }

    // Recursion (a resumed run can itself suspend again on a later approval
    // node) makes this an infinitely-sized `async fn` future unless boxed
    // explicitly; the `Pin<Box<dyn Future>>` return type is the standard fix.
    fn drive<'a>(
        &'a self,
        def: &'a WorkflowDefinition,
        run_id: RunId,
        org_id: OrgId,
        outcome: ExecutionOutcome,
        mut compensation: CompensationStack,
        approval_wait: Duration,
        cancellation: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = RunOutcome> + Send + 'a>> {
        Box::pin(async move {
            match outcome {
                ExecutionOutcome::Completed { step_results, output } => {
                    write_best_effort(self.audit.as_ref(), AuditEntry::RunCompleted { run_id }).await;
                    RunOutcome::Completed { step_results, output }
                }
                ExecutionOutcome::Failed { error, kind, step_results } => {
                    let summary = if compensation.is_empty() || kind == ErrorKind::Validation {
                        None
                    } else {
                        Some(compensation.replay(self.executor.invoker().as_ref(), cancellation).await)
                    };
                    write_best_effort(self.audit.as_ref(), AuditEntry::RunFailed { run_id, error_code: error.clone() }).await;
                    RunOutcome::Failed { error, step_results, compensation: summary }
                }
                ExecutionOutcome::Suspended { engine_state } => {
                    let Some(node_id) = engine_state.suspended_at_node_id.clone() else {
                        return RunOutcome::AwaitingApproval { engine_state };
                    };
                    let tool_call_id = cirrus_core::ToolCallId::v4();
                    let rx = self.approvals.begin_pending(tool_call_id, node_id.to_string(), Value::Null, Some(org_id), None);
                    let wait_for = approval_wait.min(Duration::from_millis(u64::try_from(APPROVAL_TTL_MS).unwrap_or(u64::MAX)));
                    let approved = ApprovalStore::wait(rx, wait_for).await;

                    if !approved {
                        return RunOutcome::AwaitingApproval { engine_state };
                    }

                    let next = self.executor.resume(def, run_id, engine_state, Value::Null, &mut compensation, cancellation.clone()).await;
                    self.drive(def, run_id, org_id, next, compensation, approval_wait, cancellation).await
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language_model::{CompletionConfig, LanguageModel};
    use crate::registry::{ApprovalLevel, ToolCategory, ToolDefinition, ToolInvoker, ToolRegistry};
    use crate::stream_bus::StreamBus;
    use async_trait::async_trait;
    use cirrus_core::{NodeId, UserId, WorkflowId};
    use cirrus_workflow::node::{Node, NodeKind};
    use cirrus_workflow::{Edge, WorkflowStatus};
    use serde_json::json;

    struct EchoInvoker;

    #[async_trait]
    impl ToolInvoker for EchoInvoker {
        async fn invoke(&self, _tool_name: &str, args: &Value, _cancellation: CancellationToken) -> Result<Value, CirrusError> {
            Ok(args.clone())
        }
    }

    struct NoopLanguageModel;

    #[async_trait]
    impl LanguageModel for NoopLanguageModel {
        async fn complete(&self, _prompt: &str, _system_prompt: Option<&str>, _config: CompletionConfig, _cancellation: CancellationToken) -> Result<String, CirrusError> {
            Ok("{}".to_string())
        }
    }

    use cirrus_error::CirrusError;

    fn supervisor() -> RunSupervisor {
        let registry = Arc::new(ToolRegistry::new(Arc::new(EchoInvoker)).register(ToolDefinition {
            name: "noop".into(),
            category: ToolCategory::Compute,
            approval_level: ApprovalLevel::Auto,
            parameter_schema: json!({}),
        }));
        let executor = WorkflowExecutor::new(registry, Arc::new(NoopLanguageModel), StreamBus::new(), Arc::new(audit::NoopAuditSink));
        RunSupervisor::new(executor, Arc::new(ApprovalStore::new()), Arc::new(audit::NoopAuditSink))
    }

    fn node(id: &str, kind: NodeKind) -> Node {
        Node { id: NodeId::new(id), kind }
    }

    fn def(nodes: Vec<Node>, edges: Vec<Edge>) -> WorkflowDefinition {
        WorkflowDefinition { id: WorkflowId::new("wf"), version: 1, status: WorkflowStatus::Published, nodes, edges, user_id: UserId::v4(), org_id: OrgId::v4() }
    }

    #[tokio::test]
    async fn completed_run_never_touches_compensation() {
        let sup = supervisor();
        let d = def(
            vec![node("input", NodeKind::Input), node("output", NodeKind::Output { output_mapping: None })],
            vec![Edge { id: "e1".into(), source: NodeId::new("input"), target: NodeId::new("output") }],
        );
        let outcome = sup.run(&d, RunId::v4(), OrgId::v4(), json!({}), Duration::from_millis(10), CancellationToken::new()).await;
        assert!(matches!(outcome, RunOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn compensation_replays_after_a_non_validation_failure() {
        let registry = Arc::new(
            ToolRegistry::new(Arc::new(EchoInvoker))
                .register(ToolDefinition { name: "createBucket".into(), category: ToolCategory::Storage, approval_level: ApprovalLevel::Auto, parameter_schema: json!({}) })
                .register(ToolDefinition { name: "deleteBucket".into(), category: ToolCategory::Storage, approval_level: ApprovalLevel::Auto, parameter_schema: json!({}) })
                .register(ToolDefinition { name: "failOp".into(), category: ToolCategory::Compute, approval_level: ApprovalLevel::Auto, parameter_schema: json!({}) }),
        );
        let executor = WorkflowExecutor::new(registry, Arc::new(NoopLanguageModel), StreamBus::new(), Arc::new(audit::NoopAuditSink));
        let sup = RunSupervisor::new(executor, Arc::new(ApprovalStore::new()), Arc::new(audit::NoopAuditSink));

        let d = def(
            vec![
                node("input", NodeKind::Input),
                node(
                    "t1",
                    NodeKind::Tool { tool_name: "createBucket".into(), args: json!({}), compensate: Some(cirrus_workflow::node::Compensate { action: "deleteBucket".into(), args: None }) },
                ),
                node("t2", NodeKind::Tool { tool_name: "failOp".into(), args: json!({}), compensate: None }),
            ],
            vec![Edge { id: "e1".into(), source: NodeId::new("input"), target: NodeId::new("t1") }, Edge { id: "e2".into(), source: NodeId::new("t1"), target: NodeId::new("t2") }],
        );
        let outcome = sup.run(&d, RunId::v4(), OrgId::v4(), json!({}), Duration::from_millis(10), CancellationToken::new()).await;
        match outcome {
            RunOutcome::Failed { compensation, .. } => {
                let summary = compensation.expect("a non-validation failure after a successful tool must replay compensation");
                assert_eq!(summary.total, 1);
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn compensation_does_not_replay_after_a_validation_failure() {
        let registry = Arc::new(
            ToolRegistry::new(Arc::new(EchoInvoker))
                .register(ToolDefinition { name: "createBucket".into(), category: ToolCategory::Storage, approval_level: ApprovalLevel::Auto, parameter_schema: json!({}) })
                .register(ToolDefinition { name: "deleteBucket".into(), category: ToolCategory::Storage, approval_level: ApprovalLevel::Auto, parameter_schema: json!({}) }),
        );
        let executor = WorkflowExecutor::new(registry, Arc::new(NoopLanguageModel), StreamBus::new(), Arc::new(audit::NoopAuditSink));
        let sup = RunSupervisor::new(executor, Arc::new(ApprovalStore::new()), Arc::new(audit::NoopAuditSink));

        let d = def(
            vec![
                node("input", NodeKind::Input),
                node(
                    "t1",
                    NodeKind::Tool { tool_name: "createBucket".into(), args: json!({}), compensate: Some(cirrus_workflow::node::Compensate { action: "deleteBucket".into(), args: None }) },
                ),
                node(
                    "ai1",
                    NodeKind::AiStep {
                        prompt: "summarize".into(),
                        system_prompt: None,
                        model: None,
                        temperature: None,
                        max_tokens: None,
                        output_schema: Some(json!({"required": ["summary"]})),
                    },
                ),
            ],
            vec![Edge { id: "e1".into(), source: NodeId::new("input"), target: NodeId::new("t1") }, Edge { id: "e2".into(), source: NodeId::new("t1"), target: NodeId::new("ai1") }],
        );
        // `NoopLanguageModel` returns `"{}"`, which parses but is missing the
        // schema's required `summary` key — a `Validation` failure.
        let outcome = sup.run(&d, RunId::v4(), OrgId::v4(), json!({}), Duration::from_millis(10), CancellationToken::new()).await;
        match outcome {
            RunOutcome::Failed { compensation, .. } => {
                assert!(compensation.is_none(), "a validation failure must not trigger compensation replay");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn suspended_run_without_a_decision_reports_awaiting_approval() {
        let sup = supervisor();
        let d = def(
            vec![node("input", NodeKind::Input), node("a1", NodeKind::Approval), node("output", NodeKind::Output { output_mapping: None })],
            vec![Edge { id: "e1".into(), source: NodeId::new("input"), target: NodeId::new("a1") }, Edge { id: "e2".into(), source: NodeId::new("a1"), target: NodeId::new("output") }],
        );
        let outcome = sup.run(&d, RunId::v4(), OrgId::v4(), json!({}), Duration::from_millis(20), CancellationToken::new()).await;
        assert!(matches!(outcome, RunOutcome::AwaitingApproval { .. }));
    }
}
