//! Single-use, time-bounded approval tokens and the pending-approval
//! continuation a gated tool call blocks on.
//!
//! `consume` must be serializable — at most one concurrent caller for the
//! same `toolCallId` may succeed. `DashMap::remove_if` gives us that for
//! free: the shard lock covering the key is held for the whole
//! check-and-remove, so two racing `consume` calls on the same key are
//! strictly ordered by the shard lock, and only the first can observe (and
//! remove) the record.

use chrono::{DateTime, Utc};
use cirrus_core::{OrgId, ToolCallId};
use cirrus_error::CirrusError;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::{self, Duration};

use crate::budget::APPROVAL_TTL_MS;

#[derive(Debug, Clone)]
pub struct ApprovalRecord {
    pub tool_call_id: ToolCallId,
    pub tool_name: String,
    pub created_at: DateTime<Utc>,
    pub org_id: Option<OrgId>,
    pub session_id: Option<String>,
}

/// Metadata for a pending approval, returned by [`ApprovalStore::pending`].
/// The continuation itself (the oneshot sender) never leaves the store.
#[derive(Debug, Clone)]
pub struct PendingApprovalView {
    pub tool_call_id: ToolCallId,
    pub tool_name: String,
    pub args: Value,
    pub org_id: Option<OrgId>,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

struct PendingEntry {
    view: PendingApprovalView,
    resolve: oneshot::Sender<bool>,
}

pub struct ApprovalStore {
    records: DashMap<ToolCallId, ApprovalRecord>,
    pending: DashMap<ToolCallId, PendingEntry>,
}

impl Default for ApprovalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalStore {
    #[must_use]
    pub fn new() -> Self {
        Self { records: DashMap::new(), pending: DashMap::new() }
    }

    /// Insert a single-use record. Submitting the same `toolCallId` twice
    /// before it is consumed is treated as an idempotent overwrite (resets
    /// `createdAt`).
    pub fn record(&self, tool_call_id: ToolCallId, tool_name: impl Into<String>, org_id: Option<OrgId>) {
        self.records.insert(tool_call_id, ApprovalRecord { tool_call_id, tool_name: tool_name.into(), created_at: Utc::now(), org_id, session_id: None });
    }

    /// Atomically check-and-remove. Returns `true` exactly once per
    /// successful approval, regardless of concurrent callers.
    pub fn consume(&self, tool_call_id: ToolCallId, tool_name: &str) -> bool {
        let mut matched = false;
        self.records.remove_if(&tool_call_id, |_, record| {
            matched = record.tool_name == tool_name && Self::within_ttl(record.created_at);
            matched
        });
        matched
    }

    fn within_ttl(created_at: DateTime<Utc>) -> bool {
        let age_ms = (Utc::now() - created_at).num_milliseconds();
        age_ms <= APPROVAL_TTL_MS
    }

    /// Register a pending approval and return the receiver the gated caller
    /// blocks on, racing it against `deadline`.
    pub fn begin_pending(&self, tool_call_id: ToolCallId, tool_name: impl Into<String>, args: Value, org_id: Option<OrgId>, session_id: Option<String>) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        let view = PendingApprovalView { tool_call_id, tool_name: tool_name.into(), args, org_id, session_id, created_at: Utc::now() };
        self.pending.insert(tool_call_id, PendingEntry { view, resolve: tx });
        rx
    }

    /// Blocks the caller on the pending approval's decision, bounded by
    /// `timeout`. A timeout or a dropped sender resolves as `false`.
    pub async fn wait(rx: oneshot::Receiver<bool>, timeout: Duration) -> bool {
        match time::timeout(timeout, rx).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(_)) | Err(_) => false,
        }
    }

    /// Pending approvals owned by `org_id`. `None` is treated as its own
    /// tenant, distinct from every `Some(org_id)`.
    #[must_use]
    pub fn pending(&self, org_id: Option<OrgId>) -> Vec<PendingApprovalView> {
        self.pending.iter().filter(|e| e.value().view.org_id == org_id).map(|e| e.value().view.clone()).collect()
    }

    /// Resolve a pending approval. Rejects with `Forbidden` if `caller_org_id`
    /// does not match the entry's owning org — this is the cross-tenant gate.
    /// Returns the tool name when the decision was an approval, so a caller
    /// can write an audit record without a second lookup.
    pub fn resolve(&self, tool_call_id: ToolCallId, approved: bool, caller_org_id: Option<OrgId>) -> Result<Option<String>, CirrusError> {
        let Some((_, entry)) = self.pending.remove(&tool_call_id) else {
            return Err(CirrusError::not_found("unknown_approval", "no pending approval with that id"));
        };
        if entry.view.org_id != caller_org_id {
            // Put it back: a cross-tenant call must not observe or mutate it.
            self.pending.insert(tool_call_id, entry);
            return Err(CirrusError::forbidden("cross_tenant_approval", "approval belongs to a different organization"));
        }
        let tool_name = entry.view.tool_name.clone();
        if approved {
            self.record(tool_call_id, entry.view.tool_name.clone(), entry.view.org_id);
        }
        let _ = entry.resolve.send(approved);
        Ok(approved.then_some(tool_name))
    }
}
