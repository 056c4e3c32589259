//! Stub capabilities for a definition with no real cloud backend or model
//! provider wired up — the same echo/no-op test-double pattern used in
//! `cirrus-execution`'s and `cirrus-api`'s own test modules, promoted to
//! this runner's production path since it has no backend of its own to call.

use async_trait::async_trait;
use cirrus_error::CirrusError;
use cirrus_execution::language_model::{CompletionConfig, LanguageModel};
use cirrus_execution::registry::ToolInvoker;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Echoes its arguments back as the tool's result, so a run exercises the
/// full executor/guardrail/approval path without a cloud SDK behind it.
pub struct EchoInvoker;

#[async_trait]
impl ToolInvoker for EchoInvoker {
    async fn invoke(&self, tool_name: &str, args: &Value, _cancellation: CancellationToken) -> Result<Value, CirrusError> {
        tracing::debug!(tool_name, %args, "stub tool invocation");
        Ok(args.clone())
    }
}

/// Returns an empty JSON object for every completion request. `ai-step`
/// nodes in a definition run against this runner still execute, they just
/// produce no real content.
pub struct StubLanguageModel;

#[async_trait]
impl LanguageModel for StubLanguageModel {
    async fn complete(&self, _prompt: &str, _system_prompt: Option<&str>, _config: CompletionConfig, _cancellation: CancellationToken) -> Result<String, CirrusError> {
        Ok("{}".to_string())
    }
}
