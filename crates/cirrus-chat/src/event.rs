//! The pull-based event sequence a chat stream consumer receives: text
//! chunks interleaved with tool-call lifecycle events, terminated by `Done`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolProgressStage {
    Queued,
    Executing,
    Completed,
    Error,
}

/// One event in a chat stream. `ToolProgress` is transient UI signalling —
/// a consumer that only cares about the final transcript can ignore it and
/// still reconstruct the conversation from `Text`/`ToolInvocation*`/`Done`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    Text {
        chunk: String,
    },
    ToolInvocationStarted {
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    ToolInvocationCompleted {
        tool_call_id: String,
        result: Value,
        duration_ms: u64,
    },
    ToolInvocationFailed {
        tool_call_id: String,
        error_text: String,
        duration_ms: u64,
    },
    ToolProgress {
        tool_call_id: String,
        stage: ToolProgressStage,
        message: Option<String>,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    },
    Done,
}
