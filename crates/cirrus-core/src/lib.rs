//! Core identifiers and run-scoped context for the cirrus runtime.

pub mod context;
pub mod id;

pub use context::RunContext;
pub use id::{NodeId, OrgId, RunId, ToolCallId, UserId, WorkflowId};
