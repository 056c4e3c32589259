//! Minimal runner: loads a workflow definition from a JSON file, runs it
//! in-process against a stub tool invoker and language model, and prints
//! the stream-bus events as they arrive. No TUI, no filesystem watching, no
//! remote control plane — those belong to a real operator surface this core
//! doesn't provide.

mod invoker;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cirrus_core::{OrgId, RunId};
use cirrus_execution::audit::NoopAuditSink;
use cirrus_execution::executor::WorkflowExecutor;
use cirrus_execution::registry::{ApprovalLevel, ToolCategory, ToolDefinition, ToolRegistry};
use cirrus_execution::stream_bus::StreamBus;
use cirrus_execution::approval::ApprovalStore;
use cirrus_execution::{RunOutcome, RunSupervisor};
use cirrus_workflow::node::NodeKind;
use cirrus_workflow::WorkflowDefinition;
use clap::Parser;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use invoker::{EchoInvoker, StubLanguageModel};

/// Run a workflow definition in-process against stub capabilities.
#[derive(Parser, Debug)]
#[command(name = "cirrus", about)]
struct Cli {
    /// Path to a workflow definition JSON file.
    definition: PathBuf,

    /// JSON input handed to the `input` node. Defaults to `{}`.
    #[arg(long, default_value = "{}")]
    input: String,

    /// Optional `cirrus-config` TOML file overlay.
    #[arg(long)]
    config: Option<PathBuf>,

    /// How long to block on each approval node before reporting
    /// `AwaitingApproval`. No real approver exists in this runner, so the
    /// default is short.
    #[arg(long, default_value_t = 200)]
    approval_wait_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = cirrus_log::auto_init().context("failed to initialize logging")?;
    let cli = Cli::parse();

    let config = cirrus_config::load(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::info!(?config, "loaded configuration");

    let raw = std::fs::read_to_string(&cli.definition).with_context(|| format!("failed to read {}", cli.definition.display()))?;
    let definition: WorkflowDefinition = serde_json::from_str(&raw).context("workflow definition is not valid JSON")?;
    let input: Value = serde_json::from_str(&cli.input).context("--input is not valid JSON")?;

    let registry = Arc::new(build_registry(&definition));
    let stream_bus = StreamBus::new();
    let audit: Arc<dyn cirrus_execution::audit::AuditSink> = Arc::new(NoopAuditSink);
    let executor = WorkflowExecutor::new(registry, Arc::new(StubLanguageModel), stream_bus.clone(), Arc::clone(&audit));
    let supervisor = RunSupervisor::new(executor, Arc::new(ApprovalStore::new()), audit);

    let run_id = RunId::v4();
    let (mut events, unsubscribe) = stream_bus.subscribe(run_id);
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!("{}", serde_json::to_string(&event).unwrap_or_else(|_| "<unserializable event>".to_string()));
        }
    });

    let outcome = supervisor
        .run(&definition, run_id, OrgId::v4(), input, Duration::from_millis(cli.approval_wait_ms), CancellationToken::new())
        .await;
    // No further events for this run_id will be emitted once `run` returns;
    // unsubscribing drops the sender so the printer's `recv()` loop ends.
    unsubscribe.unsubscribe();
    let _ = printer.await;

    report(&outcome)
}

/// No tool catalog is configured out of band for this runner, so the
/// registry is built by scanning the definition's own `tool` nodes and
/// registering each referenced name at [`ApprovalLevel::Auto`]. A real
/// deployment would load its catalog from `cirrus-config` or a service
/// registry instead.
fn build_registry(definition: &WorkflowDefinition) -> ToolRegistry {
    let mut registry = ToolRegistry::new(Arc::new(EchoInvoker));
    for node in &definition.nodes {
        if let NodeKind::Tool { tool_name, .. } = &node.kind {
            registry = registry.register(ToolDefinition {
                name: tool_name.clone(),
                category: ToolCategory::Compute,
                approval_level: ApprovalLevel::Auto,
                parameter_schema: serde_json::json!({}),
            });
        }
    }
    registry
}

fn report(outcome: &RunOutcome) -> Result<()> {
    match outcome {
        RunOutcome::Completed { output, .. } => {
            println!("completed: {output}");
            Ok(())
        }
        RunOutcome::Failed { error, compensation, .. } => {
            println!("failed: {error}");
            if let Some(summary) = compensation {
                println!("compensation: {summary:?}");
            }
            anyhow::bail!("workflow run failed: {error}")
        }
        RunOutcome::AwaitingApproval { .. } => {
            println!("awaiting approval: no decision arrived within the wait window");
            Ok(())
        }
    }
}
