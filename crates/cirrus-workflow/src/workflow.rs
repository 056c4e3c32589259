use cirrus_core::{OrgId, UserId, WorkflowId};
use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::node::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    Published,
    Archived,
}

/// Immutable blueprint: never mutated in place, a new version is a new record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub version: u64,
    pub status: WorkflowStatus,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub user_id: UserId,
    pub org_id: OrgId,
}

impl WorkflowDefinition {
    #[must_use]
    pub fn find_node(&self, id: &cirrus_core::NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }
}
