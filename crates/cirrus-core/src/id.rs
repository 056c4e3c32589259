//! Strongly-typed identifiers for core runtime entities.
//!
//! System-generated identifiers (runs, tool calls, organizations, users) are
//! UUID-based via [`domain-key`](https://crates.io/crates/domain-key) — `Copy`,
//! 16 bytes, full serde support. `NodeId` and `WorkflowId` are author-assigned
//! strings (workflow authors write `"t1"`, `"cond"`, `"approval_a1"` into a
//! definition's JSON), so they stay newtype `String` wrappers instead.

use domain_key::define_uuid;
use std::fmt;

define_uuid!(RunIdDomain => RunId);
define_uuid!(ToolCallIdDomain => ToolCallId);
define_uuid!(OrgIdDomain => OrgId);
define_uuid!(UserIdDomain => UserId);

/// Identifier of a node within a single workflow definition. Author-assigned,
/// unique only within that definition — never compared across definitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a workflow definition. Author- or API-assigned; opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(String);

impl WorkflowId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WorkflowId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkflowId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_v4_is_non_nil() {
        assert!(!RunId::v4().is_nil());
    }

    #[test]
    fn node_id_roundtrips_through_display() {
        let id = NodeId::new("t1");
        assert_eq!(id.to_string(), "t1");
        assert_eq!(id.as_str(), "t1");
    }

    #[test]
    fn node_id_ordering_is_lexicographic() {
        let mut ids = vec![NodeId::new("b"), NodeId::new("a"), NodeId::new("c")];
        ids.sort();
        assert_eq!(ids, vec![NodeId::new("a"), NodeId::new("b"), NodeId::new("c")]);
    }

    #[test]
    fn workflow_id_from_str() {
        let id: WorkflowId = "wf-1".into();
        assert_eq!(id.as_str(), "wf-1");
    }
}
