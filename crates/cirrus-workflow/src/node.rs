//! Node data polymorphism: a tagged union instead of an opaque map. Parsing
//! a definition validates each node's shape exactly once, at deserialization
//! time, rather than re-checking fields on every dispatch.

use std::collections::BTreeMap;

use cirrus_core::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(flatten)]
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    All,
    First,
    Majority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorHandling {
    FailFast,
    Continue,
    Collect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Compensate {
    pub action: String,
    #[serde(default)]
    pub args: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum NodeKind {
    Input,
    Output {
        #[serde(default)]
        output_mapping: Option<BTreeMap<String, String>>,
    },
    Tool {
        tool_name: String,
        #[serde(default)]
        args: Value,
        #[serde(default)]
        compensate: Option<Compensate>,
    },
    Condition {
        expression: String,
        #[serde(default)]
        true_branch: Option<NodeId>,
        #[serde(default)]
        false_branch: Option<NodeId>,
    },
    Approval,
    #[serde(rename = "ai-step")]
    AiStep {
        prompt: String,
        #[serde(default)]
        system_prompt: Option<String>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        temperature: Option<f64>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default)]
        output_schema: Option<Value>,
    },
    Loop {
        iterator_expression: String,
        #[serde(default = "default_iteration_variable")]
        iteration_variable: String,
        #[serde(default = "default_index_variable")]
        index_variable: String,
        #[serde(default)]
        max_iterations: Option<u32>,
        #[serde(default)]
        break_condition: Option<String>,
        #[serde(default = "default_execution_mode")]
        execution_mode: ExecutionMode,
    },
    Parallel {
        branch_node_ids: Vec<NodeId>,
        merge_strategy: MergeStrategy,
        error_handling: ErrorHandling,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
}

impl NodeKind {
    #[must_use]
    pub fn can_skip_downstream(&self) -> bool {
        matches!(self, NodeKind::Condition { .. })
    }

    #[must_use]
    pub fn can_suspend(&self) -> bool {
        matches!(self, NodeKind::Approval)
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Input => "input",
            NodeKind::Output { .. } => "output",
            NodeKind::Tool { .. } => "tool",
            NodeKind::Condition { .. } => "condition",
            NodeKind::Approval => "approval",
            NodeKind::AiStep { .. } => "ai-step",
            NodeKind::Loop { .. } => "loop",
            NodeKind::Parallel { .. } => "parallel",
        }
    }
}

fn default_iteration_variable() -> String {
    "item".to_string()
}

fn default_index_variable() -> String {
    "index".to_string()
}

fn default_execution_mode() -> ExecutionMode {
    ExecutionMode::Sequential
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_node_deserializes_with_compensate() {
        let json = serde_json::json!({
            "id": "t1",
            "kind": "tool",
            "toolName": "createBucket",
            "args": {"name": "B"},
            "compensate": {"action": "deleteBucket", "args": {"name": "B"}},
        });
        let node: Node = serde_json::from_value(json).unwrap();
        match node.kind {
            NodeKind::Tool { tool_name, compensate, .. } => {
                assert_eq!(tool_name, "createBucket");
                assert_eq!(compensate.unwrap().action, "deleteBucket");
            }
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn loop_node_applies_defaults() {
        let json = serde_json::json!({
            "id": "l1",
            "kind": "loop",
            "iteratorExpression": "input.items",
        });
        let node: Node = serde_json::from_value(json).unwrap();
        match node.kind {
            NodeKind::Loop { iteration_variable, index_variable, execution_mode, .. } => {
                assert_eq!(iteration_variable, "item");
                assert_eq!(index_variable, "index");
                assert_eq!(execution_mode, ExecutionMode::Sequential);
            }
            other => panic!("wrong kind: {other:?}"),
        }
    }

    #[test]
    fn approval_node_has_no_fields() {
        let json = serde_json::json!({"id": "a1", "kind": "approval"});
        let node: Node = serde_json::from_value(json).unwrap();
        assert!(node.kind.can_suspend());
        assert!(!node.kind.can_skip_downstream());
    }
}
