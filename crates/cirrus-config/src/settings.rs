use serde::{Deserialize, Serialize};

/// Every setting this core reads at startup. Defaults mirror the hardcoded
/// budgets in `cirrus_execution::budget` and `cirrus_guardrails::token_limiter`
/// exactly, so a deployment that sets nothing behaves identically to one
/// that never linked this crate in at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CirrusConfig {
    pub execution: ExecutionLimits,
    pub guardrails: GuardrailSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionLimits {
    pub max_steps: u32,
    pub max_duration_ms: u64,
    pub approval_ttl_ms: i64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self { max_steps: 50, max_duration_ms: 300_000, approval_ttl_ms: 300_000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailSettings {
    pub max_input_chars: usize,
    pub injection_detection_enabled: bool,
    pub pii_redaction_enabled: bool,
    pub token_limit_enabled: bool,
}

impl Default for GuardrailSettings {
    fn default() -> Self {
        Self { max_input_chars: 50_000, injection_detection_enabled: true, pii_redaction_enabled: true, token_limit_enabled: true }
    }
}
