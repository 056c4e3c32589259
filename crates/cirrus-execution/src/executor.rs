//! The DAG traversal engine: validates, orders, dispatches, and — on an
//! `approval` node — suspends. Compensation and the approval wait/resolve
//! dance live one layer up (the run supervisor in `lib.rs`); this type only
//! knows "keep going, suspend, or fail".

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cirrus_core::{NodeId, RunId};
use cirrus_error::{CirrusError, ErrorKind};
use cirrus_workflow::node::{Compensate, ErrorHandling, MergeStrategy, Node, NodeKind};
use cirrus_workflow::{validate, DependencyGraph, WorkflowDefinition};
use futures::future::join_all;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use crate::audit::{redact_tool_args, write_best_effort, AuditEntry, AuditSink};
use crate::budget::{MAX_DURATION_MS, MAX_STEPS};
use crate::compensation::{CompensationEntry, CompensationStack};
use crate::language_model::{CompletionConfig, LanguageModel};
use crate::registry::{validate_args, ToolRegistry};
use crate::run::{EngineState, ExecutionOutcome};
use crate::stream_bus::{StepStage, StreamBus, StreamEvent};

enum StepDispatch {
    Value(Value),
    Suspend,
}

pub struct WorkflowExecutor {
    registry: Arc<ToolRegistry>,
    language_model: Arc<dyn LanguageModel>,
    stream_bus: StreamBus,
    audit: Arc<dyn AuditSink>,
}

impl WorkflowExecutor {
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, language_model: Arc<dyn LanguageModel>, stream_bus: StreamBus, audit: Arc<dyn AuditSink>) -> Self {
        Self { registry, language_model, stream_bus, audit }
    }

    /// The invoker backing this executor's tool registry, for the run
    /// supervisor's compensation replay — the only place outside dispatch
    /// that needs to reach a `ToolInvoker` directly.
    #[must_use]
    pub fn invoker(&self) -> Arc<dyn crate::registry::ToolInvoker> {
        self.registry.invoker()
    }

    /// Run a fresh workflow from its `input` node forward.
    pub async fn execute(&self, def: &WorkflowDefinition, run_id: RunId, input: Value, compensation: &mut CompensationStack, cancellation: CancellationToken) -> ExecutionOutcome {
        self.run_traversal(def, run_id, input, Map::new(), BTreeSet::new(), compensation, cancellation).await
    }

    /// Resume a suspended run. The suspending node is treated as already
    /// completed; `stepResults` from the suspension cookie are preserved and
    /// `input` replaces the top-level input context.
    pub async fn resume(&self, def: &WorkflowDefinition, run_id: RunId, engine_state: EngineState, input: Value, compensation: &mut CompensationStack, cancellation: CancellationToken) -> ExecutionOutcome {
        let mut step_results = engine_state.step_results;
        let mut completed = engine_state.completed_node_ids;
        if let Some(suspended) = engine_state.suspended_at_node_id {
            step_results.entry(suspended.to_string()).or_insert(Value::Null);
            completed.insert(suspended);
        }
        self.run_traversal(def, run_id, input, step_results, completed, compensation, cancellation).await
    }

    async fn run_traversal(
        &self,
        def: &WorkflowDefinition,
        run_id: RunId,
        run_input: Value,
        mut step_results: Map<String, Value>,
        completed: BTreeSet<NodeId>,
        compensation: &mut CompensationStack,
        cancellation: CancellationToken,
    ) -> ExecutionOutcome {
        self.stream_bus.emit(StreamEvent::Status { run_id, status: "running".to_string(), error: None });

        if let Err(e) = validate(def) {
            self.stream_bus.emit(StreamEvent::Status { run_id, status: "failed".to_string(), error: Some(e.message().to_string()) });
            return ExecutionOutcome::Failed { error: e.message().to_string(), kind: e.kind(), step_results };
        }

        let graph = DependencyGraph::from_definition(def);
        // `validate` above already proved acyclicity; this is the ordering
        // that traversal actually follows.
        let order = graph.topological_order().expect("validate() guarantees acyclicity");
        let predecessors = predecessor_map(def);

        let mut resolved: BTreeSet<NodeId> = BTreeSet::new();
        let mut step_count: u32 = 0;
        let started_at = Instant::now();
        let mut output: Option<Value> = None;

        for node_id in &order {
            if completed.contains(node_id) || resolved.contains(node_id) {
                continue;
            }
            let node = def.find_node(node_id).expect("topological_order only yields ids present in the definition");

            step_count += 1;
            if step_count > MAX_STEPS {
                let e = CirrusError::new(ErrorKind::RateLimited, "step_limit_exceeded", format!("workflow exceeded the {MAX_STEPS}-step budget"));
                self.stream_bus.emit(StreamEvent::Status { run_id, status: "failed".to_string(), error: Some(e.message().to_string()) });
                return ExecutionOutcome::Failed { error: e.message().to_string(), kind: e.kind(), step_results };
            }
            let elapsed_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
            if elapsed_ms > MAX_DURATION_MS {
                let e = CirrusError::new(ErrorKind::RateLimited, "time_limit_exceeded", format!("workflow exceeded its {MAX_DURATION_MS}ms budget"));
                self.stream_bus.emit(StreamEvent::Status { run_id, status: "failed".to_string(), error: Some(e.message().to_string()) });
                return ExecutionOutcome::Failed { error: e.message().to_string(), kind: e.kind(), step_results };
            }

            self.stream_bus.emit(StreamEvent::Step { run_id, stage: StepStage::Start, node_id: node_id.clone(), node_type: node.kind.label().to_string(), duration_ms: None, error: None });
            let step_started = Instant::now();

            let outcome = self
                .dispatch(def, &graph, &predecessors, node, run_id, &run_input, &mut step_results, &mut resolved, compensation, cancellation.clone())
                .await;

            let duration_ms = u64::try_from(step_started.elapsed().as_millis()).unwrap_or(u64::MAX);

            match outcome {
                Ok(StepDispatch::Suspend) => {
                    self.stream_bus.emit(StreamEvent::Step { run_id, stage: StepStage::Complete, node_id: node_id.clone(), node_type: node.kind.label().to_string(), duration_ms: Some(duration_ms), error: None });
                    self.stream_bus.emit(StreamEvent::Status { run_id, status: "suspended".to_string(), error: None });
                    let mut completed_node_ids = completed.clone();
                    completed_node_ids.extend(resolved.clone());
                    let engine_state = EngineState { suspended_at_node_id: Some(node_id.clone()), completed_node_ids, step_results };
                    return ExecutionOutcome::Suspended { engine_state };
                }
                Ok(StepDispatch::Value(value)) => {
                    self.stream_bus.emit(StreamEvent::Step { run_id, stage: StepStage::Complete, node_id: node_id.clone(), node_type: node.kind.label().to_string(), duration_ms: Some(duration_ms), error: None });
                    if matches!(node.kind, NodeKind::Output { .. }) {
                        output = Some(value.clone());
                    }
                    step_results.insert(node_id.to_string(), value);
                }
                Err(e) => {
                    self.stream_bus.emit(StreamEvent::Step { run_id, stage: StepStage::Error, node_id: node_id.clone(), node_type: node.kind.label().to_string(), duration_ms: Some(duration_ms), error: Some(e.message().to_string()) });
                    self.stream_bus.emit(StreamEvent::Status { run_id, status: "failed".to_string(), error: Some(e.message().to_string()) });
                    return ExecutionOutcome::Failed { error: e.message().to_string(), kind: e.kind(), step_results };
                }
            }
        }

        self.stream_bus.emit(StreamEvent::Status { run_id, status: "completed".to_string(), error: None });
        ExecutionOutcome::Completed { step_results: step_results.clone(), output: output.unwrap_or(Value::Object(step_results)) }
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        &self,
        def: &WorkflowDefinition,
        graph: &DependencyGraph,
        predecessors: &BTreeMap<NodeId, Vec<NodeId>>,
        node: &Node,
        run_id: RunId,
        run_input: &Value,
        step_results: &mut Map<String, Value>,
        resolved: &mut BTreeSet<NodeId>,
        compensation: &mut CompensationStack,
        cancellation: CancellationToken,
    ) -> Result<StepDispatch, CirrusError> {
        match &node.kind {
            NodeKind::Input => Ok(StepDispatch::Value(run_input.clone())),

            NodeKind::Output { output_mapping } => {
                let value = resolve_output(output_mapping.as_ref(), step_results);
                Ok(StepDispatch::Value(value))
            }

            NodeKind::Tool { tool_name, args, compensate } => {
                let (value, entry) = self.dispatch_tool(node.id.clone(), Some(run_id), tool_name, args, compensate.as_ref(), cancellation).await?;
                if let Some(entry) = entry {
                    compensation.push(entry);
                }
                Ok(StepDispatch::Value(value))
            }

            NodeKind::Condition { expression, true_branch, false_branch } => {
                let predecessor = predecessor_result(predecessors, &node.id, step_results);
                let mut ctx = step_results.clone();
                ctx.insert("result".to_string(), predecessor);
                ctx.insert("input".to_string(), Value::Object(step_results.clone()));
                let taken = cirrus_expression::evaluate_bool(expression, &Value::Object(ctx))?;

                let (taken_branch, skipped_branch) = if taken { (true_branch.clone(), false_branch.clone()) } else { (false_branch.clone(), true_branch.clone()) };
                if let Some(skip_root) = skipped_branch {
                    let skip_reach = graph.reachable_from(&skip_root);
                    let taken_reach = taken_branch.as_ref().map(|t| graph.reachable_from(t)).unwrap_or_default();
                    for id in skip_reach.difference(&taken_reach) {
                        resolved.insert(id.clone());
                    }
                }
                Ok(StepDispatch::Value(json!({"conditionResult": taken, "expression": expression})))
            }

            NodeKind::Approval => Ok(StepDispatch::Suspend),

            NodeKind::AiStep { prompt, system_prompt, model, temperature, max_tokens, output_schema } => {
                let value = self.dispatch_ai_step(prompt, system_prompt.as_deref(), model.clone(), *temperature, *max_tokens, output_schema.as_ref(), step_results, cancellation).await?;
                Ok(StepDispatch::Value(value))
            }

            NodeKind::Loop { iterator_expression, iteration_variable, index_variable, max_iterations, break_condition, execution_mode } => {
                let value = dispatch_loop(iterator_expression, iteration_variable, index_variable, *max_iterations, break_condition.as_deref(), *execution_mode, step_results)?;
                Ok(StepDispatch::Value(value))
            }

            NodeKind::Parallel { branch_node_ids, merge_strategy, error_handling, timeout_ms } => {
                let value = self.dispatch_parallel(def, branch_node_ids, *merge_strategy, *error_handling, *timeout_ms, run_id, step_results, resolved, compensation, cancellation).await?;
                Ok(StepDispatch::Value(value))
            }
        }
    }

    async fn dispatch_tool(&self, node_id: NodeId, run_id: Option<RunId>, tool_name: &str, args: &Value, compensate: Option<&Compensate>, cancellation: CancellationToken) -> Result<(Value, Option<CompensationEntry>), CirrusError> {
        let definition = self.registry.resolve(tool_name)?;
        validate_args(&definition.parameter_schema, args)?;
        // DAG-internal tool dispatch never consults the ApprovalStore: an
        // upstream `approval` node is the gate for agent-context tool calls.
        // `ApprovalStore`-based gating applies only to the standalone
        // `/tools/execute` API surface (see `crate::invocation`).
        let value = self.registry.invoker().invoke(tool_name, args, cancellation).await?;
        write_best_effort(self.audit.as_ref(), AuditEntry::ToolInvoked { run_id, tool_name: tool_name.to_string(), redacted_args: redact_tool_args(args) }).await;
        let entry = compensate.map(|c| CompensationEntry { node_id, tool_name: tool_name.to_string(), compensate_action: c.action.clone(), compensate_args: c.args.clone() });
        Ok((value, entry))
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch_ai_step(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        model: Option<String>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
        output_schema: Option<&Value>,
        step_results: &Map<String, Value>,
        cancellation: CancellationToken,
    ) -> Result<Value, CirrusError> {
        let ctx = Value::Object(step_results.clone());
        let prompt = cirrus_expression::interpolate(prompt, &ctx);
        let system_prompt = system_prompt.map(|s| cirrus_expression::interpolate(s, &ctx));
        let config = CompletionConfig { model, temperature, max_tokens };

        let text = self.language_model.complete(&prompt, system_prompt.as_deref(), config, cancellation).await?;

        match output_schema {
            Some(schema) => {
                let parsed: Value = serde_json::from_str(&text).map_err(|e| CirrusError::validation("schema_violation", format!("ai-step output did not parse as structured data: {e}")))?;
                validate_args(schema, &parsed)?;
                Ok(parsed)
            }
            None => Ok(json!({"text": text})),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch_parallel(
        &self,
        def: &WorkflowDefinition,
        branch_node_ids: &[NodeId],
        merge_strategy: MergeStrategy,
        error_handling: ErrorHandling,
        timeout_ms: Option<u64>,
        run_id: RunId,
        step_results: &mut Map<String, Value>,
        resolved: &mut BTreeSet<NodeId>,
        compensation: &mut CompensationStack,
        cancellation: CancellationToken,
    ) -> Result<Value, CirrusError> {
        let snapshot = step_results.clone();
        let branches = async {
            let futures = branch_node_ids.iter().map(|id| {
                let cancellation = cancellation.clone();
                let snapshot = &snapshot;
                async move {
                    match def.find_node(id) {
                        Some(node) => (id.clone(), self.simple_dispatch(node, run_id, snapshot, cancellation).await),
                        None => (id.clone(), Err(CirrusError::not_found("unknown_node", format!("parallel branch references unknown node '{id}'")))),
                    }
                }
            });
            join_all(futures).await
        };

        let branch_results: Vec<(NodeId, Result<(Value, Option<CompensationEntry>), CirrusError>)> = match timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), branches)
                .await
                .map_err(|_| CirrusError::new(ErrorKind::RateLimited, "parallel_group_timeout", "parallel branch group exceeded its timeout"))?,
            None => branches.await,
        };

        if matches!(error_handling, ErrorHandling::FailFast) {
            if let Some((_, Err(e))) = branch_results.iter().find(|(_, r)| r.is_err()) {
                return Err(e.clone());
            }
        }

        let total = branch_results.len();
        let succeeded = branch_results.iter().filter(|(_, r)| r.is_ok()).count();
        let merge_satisfied = match merge_strategy {
            MergeStrategy::All => succeeded == total,
            MergeStrategy::First => succeeded > 0,
            MergeStrategy::Majority => succeeded * 2 > total,
        };

        let mut merged = Map::new();
        for (id, result) in branch_results {
            resolved.insert(id.clone());
            match result {
                Ok((value, entry)) => {
                    step_results.insert(id.to_string(), value.clone());
                    merged.insert(id.to_string(), value);
                    if let Some(entry) = entry {
                        compensation.push(entry);
                    }
                }
                Err(e) => {
                    merged.insert(id.to_string(), json!({"error": e.message()}));
                }
            }
        }

        Ok(json!({
            "branchResults": merged,
            "mergeStrategy": serde_json::to_value(merge_strategy).unwrap_or(Value::Null),
            "errorHandling": serde_json::to_value(error_handling).unwrap_or(Value::Null),
            "total": total,
            "succeeded": succeeded,
            "mergeSatisfied": merge_satisfied,
        }))
    }

    /// A restricted dispatch used only for `parallel` branch nodes: no
    /// suspension, no nested `loop`/`parallel`. Branch nodes are leaves with
    /// respect to the executor's own control flow, not sub-DAGs.
    async fn simple_dispatch(&self, node: &Node, run_id: RunId, step_results: &Map<String, Value>, cancellation: CancellationToken) -> Result<(Value, Option<CompensationEntry>), CirrusError> {
        match &node.kind {
            NodeKind::Tool { tool_name, args, compensate } => self.dispatch_tool(node.id.clone(), Some(run_id), tool_name, args, compensate.as_ref(), cancellation).await,
            NodeKind::Condition { expression, .. } => {
                let taken = cirrus_expression::evaluate_bool(expression, &Value::Object(step_results.clone()))?;
                Ok((json!({"conditionResult": taken, "expression": expression}), None))
            }
            NodeKind::AiStep { prompt, system_prompt, model, temperature, max_tokens, output_schema } => {
                let value = self.dispatch_ai_step(prompt, system_prompt.as_deref(), model.clone(), *temperature, *max_tokens, output_schema.as_ref(), step_results, cancellation).await?;
                Ok((value, None))
            }
            other => Err(CirrusError::validation("unsupported_nested_node_kind", format!("node kind '{}' cannot appear inside a parallel branch", other.label()))),
        }
    }
}

fn predecessor_map(def: &WorkflowDefinition) -> BTreeMap<NodeId, Vec<NodeId>> {
    let mut predecessors: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for edge in &def.edges {
        predecessors.entry(edge.target.clone()).or_default().push(edge.source.clone());
    }
    predecessors
}

/// The immediate predecessor's own step result, bound as `result` in a
/// condition node's evaluation context. Ties among multiple predecessors
/// break on the lexicographically smallest node id, for determinism.
fn predecessor_result(predecessors: &BTreeMap<NodeId, Vec<NodeId>>, node_id: &NodeId, step_results: &Map<String, Value>) -> Value {
    predecessors
        .get(node_id)
        .and_then(|preds| preds.iter().min())
        .and_then(|p| step_results.get(p.as_str()))
        .cloned()
        .unwrap_or(Value::Null)
}

fn resolve_output(mapping: Option<&BTreeMap<String, String>>, step_results: &Map<String, Value>) -> Value {
    match mapping {
        Some(mapping) => {
            let ctx = Value::Object(step_results.clone());
            let mut out = Map::new();
            for (field, path) in mapping {
                out.insert(field.clone(), walk_dotted(&ctx, path));
            }
            Value::Object(out)
        }
        None => Value::Object(step_results.clone()),
    }
}

fn walk_dotted(context: &Value, path: &str) -> Value {
    use cirrus_expression::ast::PathSegment;
    let segments: Vec<PathSegment> = path
        .split('.')
        .map(|p| match p.parse::<i64>() {
            Ok(i) => PathSegment::Index(i),
            Err(_) => PathSegment::Field(p.to_string()),
        })
        .collect();
    cirrus_expression::eval::walk_path(context, &segments)
}

#[allow(clippy::too_many_arguments)]
fn dispatch_loop(
    iterator_expression: &str,
    iteration_variable: &str,
    index_variable: &str,
    max_iterations: Option<u32>,
    break_condition: Option<&str>,
    execution_mode: cirrus_workflow::node::ExecutionMode,
    step_results: &Map<String, Value>,
) -> Result<Value, CirrusError> {
    let base_ctx = Value::Object(step_results.clone());
    let sequence = cirrus_expression::evaluate(iterator_expression, &base_ctx)?;
    let Value::Array(items) = sequence else {
        return Err(CirrusError::validation("loop_iterator_not_sequence", "loop iteratorExpression did not evaluate to an array"));
    };

    let cap = max_iterations.map(|n| n as usize).unwrap_or(items.len());
    let limit = items.len().min(cap);

    let mut iterations = Vec::with_capacity(limit);
    let mut break_triggered = false;
    for (index, item) in items.iter().take(limit).enumerate() {
        if let Some(break_expr) = break_condition {
            let mut iter_ctx = step_results.clone();
            iter_ctx.insert(iteration_variable.to_string(), item.clone());
            iter_ctx.insert(index_variable.to_string(), json!(index));
            if cirrus_expression::evaluate_bool(break_expr, &Value::Object(iter_ctx))? {
                break_triggered = true;
                break;
            }
        }
        iterations.push(json!({"index": index, "value": item}));
    }

    Ok(json!({
        "iterations": iterations,
        "totalIterations": iterations.len(),
        "breakTriggered": break_triggered,
        "executionMode": serde_json::to_value(execution_mode).unwrap_or(Value::Null),
    }))
}
