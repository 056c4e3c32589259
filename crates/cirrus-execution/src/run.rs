use std::collections::BTreeSet;

use cirrus_core::{NodeId, OrgId, RunId, UserId, WorkflowId};
use cirrus_error::ErrorKind;
use cirrus_workflow::node::NodeKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Suspended,
    Completed,
    Failed,
}

/// The suspension cookie: opaque to callers, self-contained, sufficient to
/// resume a run without re-reading any prior state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineState {
    pub suspended_at_node_id: Option<NodeId>,
    pub completed_node_ids: BTreeSet<NodeId>,
    pub step_results: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub id: RunId,
    pub definition_id: WorkflowId,
    pub workflow_version: u64,
    pub user_id: UserId,
    pub org_id: OrgId,
    pub input: Value,
    pub status: RunStatus,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub engine_state: Option<EngineState>,
}

/// Outcome of one `execute`/`resume` call.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Completed { step_results: Map<String, Value>, output: Value },
    Suspended { engine_state: EngineState },
    /// `kind` is carried so a caller can decide whether this failure should
    /// trigger compensation replay (everything except `Validation`) without
    /// re-parsing the message text.
    Failed { error: String, kind: ErrorKind, step_results: Map<String, Value> },
}

/// The per-node record carried during traversal, not persisted beyond the
/// run.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub value: Value,
    pub node_kind_label: &'static str,
}

impl DispatchOutcome {
    #[must_use]
    pub fn new(value: Value, kind: &NodeKind) -> Self {
        Self { value, node_kind_label: kind.label() }
    }
}
