//! Transport-agnostic error taxonomy shared by every crate in the workspace.
//!
//! Mirrors the shape of a classic "kind + context + retryable" error type:
//! every operation that can fail returns a [`CirrusError`] carrying an
//! [`ErrorKind`], a sanitized user-facing message, a structured context bag
//! (never secrets), and an optional retry hint. The HTTP boundary (`cirrus-api`)
//! is the only place that maps a kind to a transport status code; nothing
//! downstream of that boundary should know what a status code is.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of error categories. New kinds are a breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorKind {
    Validation,
    NotFound,
    AuthRequired,
    Forbidden,
    RateLimited,
    ExternalCloud,
    LanguageModel,
    Database,
    Internal,
}

impl ErrorKind {
    /// The conventional HTTP status for this kind. Only `cirrus-api` should
    /// call this; core logic never reasons about transport codes.
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::AuthRequired => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::RateLimited => 429,
            Self::ExternalCloud | Self::LanguageModel => 502,
            Self::Database => 503,
            Self::Internal => 500,
        }
    }

    /// Whether an invoker may retry an operation that failed with this kind.
    /// Only `ExternalCloud` and `LanguageModel` are ever transient; everything
    /// else is a permanent rejection of this exact request.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::ExternalCloud | Self::LanguageModel)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::AuthRequired => "auth_required",
            Self::Forbidden => "forbidden",
            Self::RateLimited => "rate_limited",
            Self::ExternalCloud => "external_cloud",
            Self::LanguageModel => "language_model",
            Self::Database => "database",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// The workspace-wide error type. Construct via the `ErrorKind`-named
/// constructors (`CirrusError::validation(...)`, `CirrusError::not_found(...)`)
/// rather than the struct literal.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct CirrusError {
    kind: ErrorKind,
    message: String,
    code: String,
    context: BTreeMap<String, String>,
    retryable: bool,
}

impl CirrusError {
    #[must_use]
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            retryable: kind.is_transient(),
            kind,
            code: code.into(),
            message,
            context: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, code, message)
    }

    #[must_use]
    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, code, message)
    }

    #[must_use]
    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthRequired, "auth_required", message)
    }

    #[must_use]
    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, code, message)
    }

    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, "rate_limited", message)
    }

    #[must_use]
    pub fn external_cloud(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternalCloud, code, message)
    }

    #[must_use]
    pub fn language_model(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LanguageModel, code, message)
    }

    #[must_use]
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, "database_unavailable", message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        // Internal errors must not leak details to the caller; keep the
        // detailed message server-side via `context`, not in `message`.
        Self::new(ErrorKind::Internal, "internal_error", "an internal error occurred").with_context("detail", message)
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

pub type CirrusResult<T> = Result<T, CirrusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping_matches_each_error_kind() {
        assert_eq!(ErrorKind::Validation.http_status(), 400);
        assert_eq!(ErrorKind::AuthRequired.http_status(), 401);
        assert_eq!(ErrorKind::Forbidden.http_status(), 403);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_eq!(ErrorKind::RateLimited.http_status(), 429);
        assert_eq!(ErrorKind::ExternalCloud.http_status(), 502);
        assert_eq!(ErrorKind::Database.http_status(), 503);
        assert_eq!(ErrorKind::Internal.http_status(), 500);
    }

    #[test]
    fn only_external_kinds_are_transient() {
        assert!(ErrorKind::ExternalCloud.is_transient());
        assert!(ErrorKind::LanguageModel.is_transient());
        assert!(!ErrorKind::Validation.is_transient());
        assert!(!ErrorKind::NotFound.is_transient());
    }

    #[test]
    fn internal_error_does_not_leak_message_to_user_facing_field() {
        let err = CirrusError::internal("postgres connection reset by peer at 10.0.0.4:5432");
        assert_eq!(err.message(), "an internal error occurred");
        assert_eq!(err.context().get("detail").map(String::as_str), Some("postgres connection reset by peer at 10.0.0.4:5432"));
    }

    #[test]
    fn constructors_set_retryable_from_kind() {
        assert!(CirrusError::external_cloud("timeout", "upstream timed out").is_retryable());
        assert!(!CirrusError::validation("bad_input", "missing field").is_retryable());
    }
}
