//! Ordered input/output safety processors wrapping the streaming chat
//! pipeline: injection detection, token-budget capping, and PII redaction.

pub mod injection;
pub mod message;
pub mod pipeline;
pub mod redactor;
pub mod token_limiter;

pub use injection::InjectionDetector;
pub use message::{Message, Role};
pub use pipeline::{InputGuardrails, OutputGuardrails, RedactionResult};
pub use redactor::PiiRedactor;
pub use token_limiter::TokenLimiter;
