//! Token-by-token chat streaming: resolves a provider from the
//! [`ProviderRegistry`], validates the requested model against its
//! allowlist, wraps the underlying completion in input/output guardrails,
//! and intercepts tool calls mid-stream the way
//! `stream_request_execution_with_tool`'s internal loop does — forward
//! text, and on a tool call, execute it, emit its lifecycle events, and let
//! the provider continue from the appended result.

use std::sync::Arc;
use std::time::Instant;

use cirrus_core::OrgId;
use cirrus_error::CirrusError;
use cirrus_execution::invocation::{invoke_tool, InvocationContext};
use cirrus_execution::registry::ToolRegistry;
use cirrus_execution::approval::ApprovalStore;
use cirrus_execution::audit::{write_best_effort, AuditEntry, AuditSink};
use cirrus_guardrails::{InputGuardrails, Message, OutputGuardrails, Role};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::event::{ChatStreamEvent, ToolProgressStage};
use crate::provider::StreamingChunk;
use crate::registry::ProviderRegistry;

pub struct ChatStreamer {
    providers: Arc<ProviderRegistry>,
    tools: Arc<ToolRegistry>,
    approvals: Arc<ApprovalStore>,
    input_guardrails: InputGuardrails,
    output_guardrails: Arc<OutputGuardrails>,
    audit: Arc<dyn AuditSink>,
}

impl ChatStreamer {
    #[must_use]
    pub fn new(providers: Arc<ProviderRegistry>, tools: Arc<ToolRegistry>, approvals: Arc<ApprovalStore>, input_guardrails: InputGuardrails, output_guardrails: OutputGuardrails, audit: Arc<dyn AuditSink>) -> Self {
        Self { providers, tools, approvals, input_guardrails, output_guardrails: Arc::new(output_guardrails), audit }
    }

    /// Runs input guardrails synchronously — an abort here never starts a
    /// stream at all — then spawns the driving loop and returns the
    /// receiving half. The provider resolved for `provider_id` is pinned to
    /// this call: a later `ProviderRegistry::reload()` does not affect this
    /// stream.
    pub async fn stream(&self, provider_id: &str, messages: Vec<Message>, requested_model: Option<&str>, org_id: OrgId, cancellation: CancellationToken) -> Result<mpsc::UnboundedReceiver<ChatStreamEvent>, CirrusError> {
        if let Err(err) = self.input_guardrails.check(&messages) {
            write_best_effort(self.audit.as_ref(), AuditEntry::GuardrailBlocked { reason: err.code().to_string() }).await;
            return Err(err);
        }

        let provider = self.providers.get(provider_id).await?;
        let model = requested_model
            .filter(|m| provider.model_allowlist().iter().any(|allowed| allowed == m))
            .unwrap_or_else(|| provider.default_model())
            .to_string();

        let (tx, rx) = mpsc::unbounded_channel();
        let tools = Arc::clone(&self.tools);
        let approvals = Arc::clone(&self.approvals);
        let output_guardrails = Arc::clone(&self.output_guardrails);
        let audit = Arc::clone(&self.audit);
        drive(provider, tools, approvals, audit, output_guardrails, messages, model, org_id, tx, cancellation);
        Ok(rx)
    }
}

#[allow(clippy::too_many_arguments)]
fn drive(
    provider: Arc<dyn crate::provider::StreamingLanguageModel>,
    tools: Arc<ToolRegistry>,
    approvals: Arc<ApprovalStore>,
    audit: Arc<dyn AuditSink>,
    output_guardrails: Arc<OutputGuardrails>,
    mut messages: Vec<Message>,
    model: String,
    org_id: OrgId,
    tx: mpsc::UnboundedSender<ChatStreamEvent>,
    cancellation: CancellationToken,
) {
    tokio::spawn(async move {
        let mut assembled = String::new();

        'outer: loop {
            if cancellation.is_cancelled() {
                break;
            }

            let mut chunks = match provider.stream(&messages, &model, cancellation.clone()).await {
                Ok(chunks) => chunks,
                Err(err) => {
                    warn!(error = %err, "language model stream failed to start");
                    let _ = tx.send(ChatStreamEvent::Done);
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = cancellation.cancelled() => break 'outer,
                    next = chunks.next() => {
                        let Some(chunk) = next else { break 'outer };
                        match chunk {
                            Ok(StreamingChunk::Text(text)) => {
                                assembled.push_str(&text);
                                if tx.send(ChatStreamEvent::Text { chunk: text }).is_err() {
                                    cancellation.cancel();
                                    return;
                                }
                            }
                            Ok(StreamingChunk::ToolCall { tool_call_id, tool_name, args }) => {
                                run_tool_call(&tools, &approvals, audit.as_ref(), org_id, &tool_call_id, &tool_name, &args, &tx, cancellation.clone()).await;
                                messages.push(Message { role: Role::Assistant, text: format!("[tool_call:{tool_name}]") });
                                messages.push(Message { role: Role::System, text: format!("[tool_result:{tool_call_id}]") });
                                // Provider needs a fresh stream to continue from the appended
                                // tool result; restart the outer loop rather than this inner one.
                                continue 'outer;
                            }
                            Err(err) => {
                                warn!(error = %err, "language model stream yielded an error chunk");
                                break 'outer;
                            }
                        }
                    }
                }
            }
            break;
        }

        let redaction = output_guardrails.process(&assembled);
        if redaction.redaction_count > 0 {
            info!(redaction_count = redaction.redaction_count, "chat output guardrail redacted sensitive content for audit purposes");
        }
        let _ = tx.send(ChatStreamEvent::Done);
    });
}

#[allow(clippy::too_many_arguments)]
async fn run_tool_call(tools: &ToolRegistry, approvals: &ApprovalStore, audit: &dyn AuditSink, org_id: OrgId, tool_call_id: &str, tool_name: &str, args: &Value, tx: &mpsc::UnboundedSender<ChatStreamEvent>, cancellation: CancellationToken) {
    let _ = tx.send(ChatStreamEvent::ToolInvocationStarted { tool_call_id: tool_call_id.to_string(), tool_name: tool_name.to_string(), args: args.clone() });
    let _ = tx.send(ChatStreamEvent::ToolProgress {
        tool_call_id: tool_call_id.to_string(),
        stage: ToolProgressStage::Queued,
        message: None,
        started_at: Some(chrono::Utc::now()),
        completed_at: None,
    });

    let tool_call_id_typed = cirrus_core::ToolCallId::v4();
    approvals.record(tool_call_id_typed, tool_name, Some(org_id));

    let _ = tx.send(ChatStreamEvent::ToolProgress { tool_call_id: tool_call_id.to_string(), stage: ToolProgressStage::Executing, message: None, started_at: None, completed_at: None });

    let started = Instant::now();
    let context = InvocationContext::Api { tool_call_id: tool_call_id_typed, has_admin_permission: false };
    let result = invoke_tool(tools, approvals, audit, tool_name, args, context, cancellation).await;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(value) => {
            let _ = tx.send(ChatStreamEvent::ToolInvocationCompleted { tool_call_id: tool_call_id.to_string(), result: value, duration_ms });
            let _ = tx.send(ChatStreamEvent::ToolProgress { tool_call_id: tool_call_id.to_string(), stage: ToolProgressStage::Completed, message: None, started_at: None, completed_at: Some(chrono::Utc::now()) });
        }
        Err(err) => {
            let _ = tx.send(ChatStreamEvent::ToolInvocationFailed { tool_call_id: tool_call_id.to_string(), error_text: err.message().to_string(), duration_ms });
            let _ = tx.send(ChatStreamEvent::ToolProgress { tool_call_id: tool_call_id.to_string(), stage: ToolProgressStage::Error, message: Some(err.code().to_string()), started_at: None, completed_at: Some(chrono::Utc::now()) });
        }
    }
}
