//! Write-only audit record of executions, approvals, and workflow runs.
//! Failures here are logged and swallowed — an audit write must never block
//! or fail the primary operation.

use async_trait::async_trait;
use cirrus_core::{OrgId, RunId};
use cirrus_guardrails::PiiRedactor;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
#[allow(clippy::large_enum_variant)]
pub enum AuditEntry {
    RunStarted { run_id: RunId, org_id: OrgId, workflow_id: String },
    RunCompleted { run_id: RunId },
    RunFailed { run_id: RunId, error_code: String },
    /// `run_id` is `None` when the invocation came from the standalone
    /// tool-execution API or a chat tool call, neither of which runs inside
    /// a workflow run.
    ToolInvoked { run_id: Option<RunId>, tool_name: String, redacted_args: serde_json::Value },
    ApprovalRecorded { tool_call_id: String, tool_name: String },
    ApprovalConsumed { tool_call_id: String, tool_name: String },
    GuardrailBlocked { reason: String },
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn write(&self, entry: AuditEntry);
}

/// Writes nothing. Used where the embedding application hasn't wired a real
/// sink yet; never the production default.
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn write(&self, _entry: AuditEntry) {}
}

/// In-memory sink for tests and the CLI demo: keeps every entry written this
/// process's lifetime.
#[derive(Default)]
pub struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn write(&self, entry: AuditEntry) {
        self.entries.lock().push(entry);
    }
}

impl InMemoryAuditSink {
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }
}

/// Runs tool arguments through the PII redactor before they're handed to an
/// audit sink. Args are arbitrary caller-controlled JSON, so they're
/// serialized to text, redacted as text, and stored back as a string — never
/// as a structured value that could retain an unredacted nested field.
#[must_use]
pub fn redact_tool_args(args: &serde_json::Value) -> serde_json::Value {
    let serialized = args.to_string();
    let (redacted, _count) = PiiRedactor.redact(&serialized);
    serde_json::Value::String(redacted)
}

/// Write to `sink`, logging and swallowing any panic-worthy condition rather
/// than propagating — an audit failure must never block the primary
/// operation. `AuditSink::write` returns no `Result` by design, so the only
/// failure mode this guards is the sink itself panicking.
pub async fn write_best_effort(sink: &dyn AuditSink, entry: AuditEntry) {
    let entry_for_log = format!("{entry:?}");
    let result = std::panic::AssertUnwindSafe(sink.write(entry)).catch_unwind().await;
    if result.is_err() {
        error!(target: "cirrus_execution::audit", entry = %entry_for_log, "audit sink panicked; entry dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_sink_records_entries() {
        let sink = InMemoryAuditSink::default();
        write_best_effort(&sink, AuditEntry::RunCompleted { run_id: RunId::v4() }).await;
        assert_eq!(sink.entries().len(), 1);
    }

    #[test]
    fn redact_tool_args_strips_secrets_before_audit() {
        let redacted = redact_tool_args(&serde_json::json!({"ssn": "123-45-6789"}));
        let serde_json::Value::String(text) = redacted else { panic!("expected a string") };
        assert!(text.contains("[SSN REDACTED]"));
        assert!(!text.contains("123-45-6789"));
    }
}
