use std::sync::Arc;

use cirrus_execution::approval::ApprovalStore;
use cirrus_execution::audit::AuditSink;
use cirrus_execution::registry::ToolRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
    pub approvals: Arc<ApprovalStore>,
    pub audit: Arc<dyn AuditSink>,
}

impl AppState {
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, approvals: Arc<ApprovalStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { registry, approvals, audit }
    }
}
