//! Token-by-token chat streaming over a lazily-resolved, singleflight-cached
//! language-model provider registry. Guardrails (`cirrus-guardrails`) gate
//! the input before a stream starts; tool calls surfaced mid-stream are
//! dispatched through the same `ToolInvoker`/`ApprovalStore` plumbing
//! `cirrus-execution` uses for workflow `tool` nodes.

pub mod event;
pub mod provider;
pub mod registry;
pub mod streamer;

pub use event::{ChatStreamEvent, ToolProgressStage};
pub use provider::{StreamingChunk, StreamingLanguageModel};
pub use registry::{ProviderBuilder, ProviderRegistry};
pub use streamer::ChatStreamer;
