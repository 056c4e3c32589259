//! The capability an `ai-step` node calls. Distinct from the token-streaming
//! `ChatStreamer` in `cirrus-chat`: workflow `ai-step` nodes need one
//! request/response completion, not an interactive stream.

use async_trait::async_trait;
use cirrus_error::CirrusError;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct CompletionConfig {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, system_prompt: Option<&str>, config: CompletionConfig, cancellation: CancellationToken) -> Result<String, CirrusError>;
}
