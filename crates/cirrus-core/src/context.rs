//! Per-run ambient context threaded through the executor and invoker interfaces.
//!
//! Replaces request-scoped mutable decorations (caller identity, deadline,
//! cancellation) with one explicit value passed down the call stack, rather
//! than pulled from thread-local or global state.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::id::{OrgId, UserId};

/// Ambient identity, deadline, and cancellation for one workflow run or tool
/// invocation. Cheap to clone: the cancellation token is reference-counted
/// and the rest is `Copy`/small.
#[derive(Debug, Clone)]
pub struct RunContext {
    user_id: UserId,
    org_id: OrgId,
    request_id: String,
    deadline: Instant,
    cancellation: CancellationToken,
}

impl RunContext {
    /// Build a context with `max_duration` from now as the deadline and a
    /// fresh, unlinked cancellation token.
    #[must_use]
    pub fn new(user_id: UserId, org_id: OrgId, request_id: impl Into<String>, max_duration: Duration) -> Self {
        Self {
            user_id,
            org_id,
            request_id: request_id.into(),
            deadline: Instant::now() + max_duration,
            cancellation: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    #[must_use]
    pub fn elapsed_ms(&self, started: Instant) -> u64 {
        u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Child token for a scoped sub-operation (a tool call, a branch). Cancelling
    /// the child does not cancel the parent; cancelling the parent cascades.
    #[must_use]
    pub fn child_cancellation(&self) -> CancellationToken {
        self.cancellation.child_token()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RunContext {
        RunContext::new(UserId::v4(), OrgId::v4(), "req-1", Duration::from_millis(300_000))
    }

    #[test]
    fn fresh_context_is_not_expired_or_cancelled() {
        let ctx = ctx();
        assert!(!ctx.is_expired());
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn cancel_cascades_to_children() {
        let ctx = ctx();
        let child = ctx.child_cancellation();
        ctx.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn expiry_respects_zero_duration() {
        let ctx = RunContext::new(UserId::v4(), OrgId::v4(), "req-2", Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(1));
        assert!(ctx.is_expired());
    }
}
