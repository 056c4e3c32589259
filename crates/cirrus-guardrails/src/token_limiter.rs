use cirrus_error::CirrusError;

use crate::message::Message;

/// Default character budget. 1 token ≈ 4 chars, the same rough estimate
/// used when reporting the count back to an aborted caller.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 50_000;

pub struct TokenLimiter {
    max_input_chars: usize,
}

impl Default for TokenLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INPUT_CHARS)
    }
}

impl TokenLimiter {
    #[must_use]
    pub fn new(max_input_chars: usize) -> Self {
        Self { max_input_chars }
    }

    pub fn check(&self, messages: &[Message]) -> Result<(), CirrusError> {
        let total_chars: usize = messages.iter().map(|m| m.text.chars().count()).sum();
        if total_chars > self.max_input_chars {
            let estimated_tokens = total_chars / 4;
            return Err(CirrusError::validation(
                "input_too_large",
                format!("Your message is too long to process (≈{estimated_tokens} tokens). Please shorten it and try again."),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    fn msg(text: &str) -> Message {
        Message { role: Role::User, text: text.to_string() }
    }

    #[test]
    fn allows_input_within_budget() {
        let limiter = TokenLimiter::new(10);
        assert!(limiter.check(&[msg("short")]).is_ok());
    }

    #[test]
    fn rejects_input_over_budget_with_token_estimate() {
        let limiter = TokenLimiter::new(8);
        let err = limiter.check(&[msg("123456789")]).unwrap_err();
        assert_eq!(err.code(), "input_too_large");
        assert!(err.message().contains('2'));
    }

    #[test]
    fn sums_across_all_messages() {
        let limiter = TokenLimiter::new(10);
        assert!(limiter.check(&[msg("12345"), msg("678901")]).is_err());
    }
}
