//! Graph algorithms over a [`WorkflowDefinition`]: cycle detection,
//! deterministic topological ordering, and BFS reachability used for
//! condition-branch pruning.
//!
//! The graph is a plain adjacency map, and the topological sort is a
//! hand-rolled Kahn's algorithm rather than a library toposort, because ties
//! must break by ascending node id for determinism — a guarantee a DFS-based
//! toposort (e.g. `petgraph::algo::toposort`) does not provide.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use cirrus_core::NodeId;

use crate::workflow::WorkflowDefinition;

pub struct DependencyGraph {
    /// node -> nodes it points to
    successors: BTreeMap<NodeId, Vec<NodeId>>,
    /// node -> in-degree (number of incoming edges)
    in_degree: BTreeMap<NodeId, usize>,
}

impl DependencyGraph {
    #[must_use]
    pub fn from_definition(def: &WorkflowDefinition) -> Self {
        let mut successors: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        let mut in_degree: BTreeMap<NodeId, usize> = BTreeMap::new();
        for node in &def.nodes {
            successors.entry(node.id.clone()).or_default();
            in_degree.entry(node.id.clone()).or_insert(0);
        }
        for edge in &def.edges {
            successors.entry(edge.source.clone()).or_default().push(edge.target.clone());
            *in_degree.entry(edge.target.clone()).or_insert(0) += 1;
        }
        Self { successors, in_degree }
    }

    #[must_use]
    pub fn successors_of(&self, id: &NodeId) -> &[NodeId] {
        self.successors.get(id).map_or(&[], Vec::as_slice)
    }

    /// Kahn's algorithm with a `BTreeSet` ready-frontier so ties are always
    /// broken by ascending node id. Returns `None` if the graph has a cycle.
    #[must_use]
    pub fn topological_order(&self) -> Option<Vec<NodeId>> {
        let mut in_degree = self.in_degree.clone();
        let mut ready: BTreeSet<NodeId> = in_degree.iter().filter(|(_, &d)| d == 0).map(|(id, _)| id.clone()).collect();
        let mut order = Vec::with_capacity(in_degree.len());

        while let Some(next) = ready.iter().next().cloned() {
            ready.remove(&next);
            order.push(next.clone());
            for succ in self.successors_of(&next) {
                if let Some(d) = in_degree.get_mut(succ) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(succ.clone());
                    }
                }
            }
        }

        if order.len() == in_degree.len() {
            Some(order)
        } else {
            None
        }
    }

    /// Nodes reachable from `start` (inclusive), via BFS.
    #[must_use]
    pub fn reachable_from(&self, start: &NodeId) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        seen.insert(start.clone());
        queue.push_back(start.clone());
        while let Some(current) = queue.pop_front() {
            for succ in self.successors_of(&current) {
                if seen.insert(succ.clone()) {
                    queue.push_back(succ.clone());
                }
            }
        }
        seen
    }
}
