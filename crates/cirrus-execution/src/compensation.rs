//! Saga compensation: an owned, push-only stack of rollback records per run.
//! No shared references — the run exclusively owns it.

use std::sync::Arc;

use cirrus_core::NodeId;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::registry::ToolInvoker;

#[derive(Debug, Clone)]
pub struct CompensationEntry {
    pub node_id: NodeId,
    pub tool_name: String,
    pub compensate_action: String,
    pub compensate_args: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct CompensationResult {
    pub node_id: NodeId,
    pub compensate_action: String,
    pub succeeded: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompensationSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<CompensationResult>,
}

#[derive(Debug, Default)]
pub struct CompensationStack {
    entries: Vec<CompensationEntry>,
}

impl CompensationStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: CompensationEntry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Replay every pushed entry in reverse insertion order via `invoker`.
    /// Best-effort: a failing compensation does not halt the rest. Every
    /// entry is attempted exactly once.
    pub async fn replay(&self, invoker: &dyn ToolInvoker, cancellation: CancellationToken) -> CompensationSummary {
        let mut results = Vec::with_capacity(self.entries.len());
        for entry in self.entries.iter().rev() {
            let args = entry.compensate_args.clone().unwrap_or(Value::Null);
            let outcome = invoker.invoke(&entry.compensate_action, &args, cancellation.clone()).await;
            results.push(match outcome {
                Ok(_) => CompensationResult { node_id: entry.node_id.clone(), compensate_action: entry.compensate_action.clone(), succeeded: true, error: None },
                Err(e) => CompensationResult { node_id: entry.node_id.clone(), compensate_action: entry.compensate_action.clone(), succeeded: false, error: Some(e.message().to_string()) },
            });
        }
        let succeeded = results.iter().filter(|r| r.succeeded).count();
        let failed = results.len() - succeeded;
        CompensationSummary { total: results.len(), succeeded, failed, results }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cirrus_error::CirrusError;
    use std::sync::Mutex;

    struct RecordingInvoker {
        calls: Mutex<Vec<String>>,
        fail: Vec<String>,
    }

    #[async_trait]
    impl ToolInvoker for RecordingInvoker {
        async fn invoke(&self, tool_name: &str, _args: &Value, _cancellation: CancellationToken) -> Result<Value, CirrusError> {
            self.calls.lock().unwrap().push(tool_name.to_string());
            if self.fail.contains(&tool_name.to_string()) {
                Err(CirrusError::external_cloud("compensation_failed", "downstream rejected compensation"))
            } else {
                Ok(Value::Null)
            }
        }
    }

    #[tokio::test]
    async fn replays_in_reverse_insertion_order() {
        let mut stack = CompensationStack::new();
        stack.push(CompensationEntry { node_id: NodeId::new("n1"), tool_name: "createBucket".into(), compensate_action: "deleteBucket".into(), compensate_args: None });
        stack.push(CompensationEntry { node_id: NodeId::new("n2"), tool_name: "attachVolume".into(), compensate_action: "detachVolume".into(), compensate_args: None });

        let invoker = RecordingInvoker { calls: Mutex::new(vec![]), fail: vec![] };
        let summary = stack.replay(&invoker, CancellationToken::new()).await;

        assert_eq!(invoker.calls.lock().unwrap().clone(), vec!["detachVolume", "deleteBucket"]);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn a_failing_compensation_does_not_halt_the_rest() {
        let mut stack = CompensationStack::new();
        stack.push(CompensationEntry { node_id: NodeId::new("n1"), tool_name: "createBucket".into(), compensate_action: "deleteBucket".into(), compensate_args: None });
        stack.push(CompensationEntry { node_id: NodeId::new("n2"), tool_name: "failOp".into(), compensate_action: "undoFailOp".into(), compensate_args: None });

        let invoker = RecordingInvoker { calls: Mutex::new(vec![]), fail: vec!["undoFailOp".to_string()] };
        let summary = stack.replay(&invoker, CancellationToken::new()).await;

        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        // Both were still attempted despite the first (in replay order) failing.
        assert_eq!(invoker.calls.lock().unwrap().len(), 2);
    }
}
