use std::collections::BTreeSet;

use cirrus_error::CirrusError;

use crate::graph::DependencyGraph;
use crate::node::NodeKind;
use crate::workflow::WorkflowDefinition;

/// Checks invariant (definition): every edge endpoint names a real node, no
/// multi-edges between the same pair, the graph is acyclic, and every
/// terminal `output` node is reachable from at least one node.
pub fn validate(def: &WorkflowDefinition) -> Result<(), CirrusError> {
    let node_ids: BTreeSet<_> = def.nodes.iter().map(|n| n.id.clone()).collect();

    for edge in &def.edges {
        if !node_ids.contains(&edge.source) {
            return Err(CirrusError::validation("unknown_edge_source", format!("edge '{}' references unknown source node '{}'", edge.id, edge.source)));
        }
        if !node_ids.contains(&edge.target) {
            return Err(CirrusError::validation("unknown_edge_target", format!("edge '{}' references unknown target node '{}'", edge.id, edge.target)));
        }
    }

    let mut seen_pairs = BTreeSet::new();
    for edge in &def.edges {
        let pair = (edge.source.clone(), edge.target.clone());
        if !seen_pairs.insert(pair) {
            return Err(CirrusError::validation("duplicate_edge", format!("multiple edges from '{}' to '{}'", edge.source, edge.target)));
        }
    }

    let graph = DependencyGraph::from_definition(def);
    if graph.topological_order().is_none() {
        return Err(CirrusError::validation("cycle_detected", "workflow definition contains a cycle"));
    }

    let all_reachable: BTreeSet<_> = def
        .nodes
        .iter()
        .flat_map(|n| graph.reachable_from(&n.id))
        .collect();
    for node in &def.nodes {
        if matches!(node.kind, NodeKind::Output { .. }) && !all_reachable.contains(&node.id) {
            return Err(CirrusError::validation("unreachable_output", format!("output node '{}' is not reachable from any node", node.id)));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::node::Node;
    use crate::workflow::WorkflowStatus;
    use cirrus_core::{NodeId, OrgId, UserId, WorkflowId};

    fn def(nodes: Vec<Node>, edges: Vec<Edge>) -> WorkflowDefinition {
        WorkflowDefinition {
            id: WorkflowId::new("wf"),
            version: 1,
            status: WorkflowStatus::Draft,
            nodes,
            edges,
            user_id: UserId::v4(),
            org_id: OrgId::v4(),
        }
    }

    #[test]
    fn rejects_cycle() {
        let d = def(
            vec![
                Node { id: NodeId::new("a"), kind: NodeKind::Input },
                Node { id: NodeId::new("b"), kind: NodeKind::Output { output_mapping: None } },
            ],
            vec![Edge { id: "e1".into(), source: NodeId::new("a"), target: NodeId::new("b") }, Edge { id: "e2".into(), source: NodeId::new("b"), target: NodeId::new("a") }],
        );
        let err = validate(&d).unwrap_err();
        assert_eq!(err.code(), "cycle_detected");
    }

    #[test]
    fn rejects_unreachable_output() {
        let d = def(
            vec![
                Node { id: NodeId::new("a"), kind: NodeKind::Input },
                Node { id: NodeId::new("out"), kind: NodeKind::Output { output_mapping: None } },
            ],
            vec![],
        );
        let err = validate(&d).unwrap_err();
        assert_eq!(err.code(), "unreachable_output");
    }

    #[test]
    fn accepts_linear_success_shape() {
        let d = def(
            vec![
                Node { id: NodeId::new("input"), kind: NodeKind::Input },
                Node { id: NodeId::new("t1"), kind: NodeKind::Tool { tool_name: "listInstances".into(), args: serde_json::json!({}), compensate: None } },
                Node { id: NodeId::new("output"), kind: NodeKind::Output { output_mapping: None } },
            ],
            vec![
                Edge { id: "e1".into(), source: NodeId::new("input"), target: NodeId::new("t1") },
                Edge { id: "e2".into(), source: NodeId::new("t1"), target: NodeId::new("output") },
            ],
        );
        assert!(validate(&d).is_ok());
    }

    #[test]
    fn rejects_duplicate_edge() {
        let d = def(
            vec![Node { id: NodeId::new("a"), kind: NodeKind::Input }, Node { id: NodeId::new("b"), kind: NodeKind::Output { output_mapping: None } }],
            vec![Edge { id: "e1".into(), source: NodeId::new("a"), target: NodeId::new("b") }, Edge { id: "e2".into(), source: NodeId::new("a"), target: NodeId::new("b") }],
        );
        let err = validate(&d).unwrap_err();
        assert_eq!(err.code(), "duplicate_edge");
    }
}
