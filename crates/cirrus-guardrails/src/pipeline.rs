use cirrus_error::CirrusError;

use crate::injection::InjectionDetector;
use crate::message::Message;
use crate::redactor::PiiRedactor;
use crate::token_limiter::TokenLimiter;

/// Ordered input processors run before a model call; the first abort
/// short-circuits the rest and the call itself.
pub struct InputGuardrails {
    injection: InjectionDetector,
    token_limiter: TokenLimiter,
}

impl Default for InputGuardrails {
    fn default() -> Self {
        Self { injection: InjectionDetector, token_limiter: TokenLimiter::default() }
    }
}

impl InputGuardrails {
    #[must_use]
    pub fn with_max_input_chars(max_input_chars: usize) -> Self {
        Self { injection: InjectionDetector, token_limiter: TokenLimiter::new(max_input_chars) }
    }

    /// Runs processors in order; the first failure aborts without running
    /// the rest.
    pub fn check(&self, messages: &[Message]) -> Result<(), CirrusError> {
        self.injection.check(messages)?;
        self.token_limiter.check(messages)?;
        Ok(())
    }
}

/// Output processors run per assistant message, not per token.
#[derive(Default)]
pub struct OutputGuardrails {
    redactor: PiiRedactor,
}

pub struct RedactionResult {
    pub text: String,
    pub redaction_count: usize,
}

impl OutputGuardrails {
    #[must_use]
    pub fn process(&self, text: &str) -> RedactionResult {
        let (text, redaction_count) = self.redactor.redact(text);
        RedactionResult { text, redaction_count }
    }
}
