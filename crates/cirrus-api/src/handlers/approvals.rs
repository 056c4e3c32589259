use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use cirrus_core::{OrgId, ToolCallId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use cirrus_execution::audit::{write_best_effort, AuditEntry};

use crate::error::ApiError;
use crate::headers::caller_org_id;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ApproveRequest {
    #[serde(rename = "toolCallId")]
    tool_call_id: ToolCallId,
    approved: bool,
    #[allow(dead_code)]
    reason: Option<String>,
}

#[derive(Serialize)]
pub struct ApproveResponse {
    resolved: bool,
}

pub async fn post_approve(State(state): State<AppState>, headers: HeaderMap, Json(request): Json<ApproveRequest>) -> Result<Json<ApproveResponse>, ApiError> {
    let tool_name = state.approvals.resolve(request.tool_call_id, request.approved, caller_org_id(&headers))?;
    if let Some(tool_name) = tool_name {
        write_best_effort(state.audit.as_ref(), AuditEntry::ApprovalRecorded { tool_call_id: request.tool_call_id.to_string(), tool_name }).await;
    }
    Ok(Json(ApproveResponse { resolved: true }))
}

#[derive(Serialize)]
pub struct PendingApproval {
    #[serde(rename = "toolCallId")]
    tool_call_id: ToolCallId,
    #[serde(rename = "toolName")]
    tool_name: String,
    args: Value,
    #[serde(rename = "orgId")]
    org_id: Option<OrgId>,
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
}

pub async fn get_pending_approvals(State(state): State<AppState>, headers: HeaderMap) -> Json<Vec<PendingApproval>> {
    let views = state.approvals.pending(caller_org_id(&headers));
    Json(
        views
            .into_iter()
            .map(|v| PendingApproval { tool_call_id: v.tool_call_id, tool_name: v.tool_name, args: v.args, org_id: v.org_id, session_id: v.session_id, created_at: v.created_at })
            .collect(),
    )
}
