//! The seam a concrete language-model SDK binding implements. No concrete
//! cloud binding is added here — this is the interface `ChatStreamer` and
//! `ProviderRegistry` drive.

use std::str::FromStr;

use async_trait::async_trait;
use cirrus_error::CirrusError;
use cirrus_guardrails::Message;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// The closed set of provider kinds a deployment may register. A provider
/// id that doesn't map to one of these is rejected before a
/// [`crate::registry::ProviderBuilder`] is ever invoked for it — there is
/// no way to register an unrecognized kind at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Oci,
    OpenAi,
    Anthropic,
    Google,
    AzureOpenAi,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Oci => "oci",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::AzureOpenAi => "azure-openai",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = CirrusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oci" => Ok(Self::Oci),
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "google" => Ok(Self::Google),
            "azure-openai" => Ok(Self::AzureOpenAi),
            other => Err(CirrusError::validation("unknown_provider_kind", format!("'{other}' is not a registered provider kind"))),
        }
    }
}

/// One item of a streaming completion: additive text, or a tool call the
/// model wants executed before it will continue.
#[derive(Debug, Clone)]
pub enum StreamingChunk {
    Text(String),
    ToolCall { tool_call_id: String, tool_name: String, args: Value },
}

/// A resolved provider instance capable of streaming a chat completion.
/// One instance is built per [`ProviderKind`] by
/// [`crate::registry::ProviderRegistry`] and then shared (cloned as an
/// `Arc`) across every stream that resolves it.
#[async_trait]
pub trait StreamingLanguageModel: Send + Sync {
    /// Models this provider instance will accept in the `model` argument to
    /// [`StreamingLanguageModel::stream`]. `model` values outside this set
    /// fall back to [`StreamingLanguageModel::default_model`].
    fn model_allowlist(&self) -> &[String];

    fn default_model(&self) -> &str;

    /// Begin (or resume, after a tool result is appended to `messages`) a
    /// streaming completion. The returned stream must stop producing items
    /// once `cancellation` fires.
    async fn stream(&self, messages: &[Message], model: &str, cancellation: CancellationToken) -> Result<BoxStream<'static, Result<StreamingChunk, CirrusError>>, CirrusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_kind_is_rejected() {
        let err = ProviderKind::from_str("made-up-provider").unwrap_err();
        assert_eq!(err.code(), "unknown_provider_kind");
    }

    #[test]
    fn every_known_kind_round_trips_through_its_str() {
        for kind in [ProviderKind::Oci, ProviderKind::OpenAi, ProviderKind::Anthropic, ProviderKind::Google, ProviderKind::AzureOpenAi] {
            assert_eq!(ProviderKind::from_str(kind.as_str()).unwrap(), kind);
        }
    }
}
