use cirrus_core::NodeId;
use serde::{Deserialize, Serialize};

/// Control/data flow edge. No multi-edges are permitted between the same
/// `(source, target)` pair — enforced in [`crate::validate::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
}
