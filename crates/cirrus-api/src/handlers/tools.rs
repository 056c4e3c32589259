use std::time::Instant;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use cirrus_core::ToolCallId;
use cirrus_execution::invocation::{InvocationContext, invoke_tool};
use cirrus_execution::registry::ApprovalLevel;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::headers::has_admin_permission;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ToolNameQuery {
    #[serde(rename = "toolName")]
    tool_name: String,
}

#[derive(Serialize)]
pub struct ToolMetadata {
    tool_name: String,
    category: cirrus_execution::registry::ToolCategory,
    approval_level: ApprovalLevel,
    requires_approval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    impact: Option<String>,
}

pub async fn get_tool_metadata(State(state): State<AppState>, Query(query): Query<ToolNameQuery>) -> Result<Json<ToolMetadata>, ApiError> {
    let def = state.registry.resolve(&query.tool_name)?;
    let warning = match def.approval_level {
        ApprovalLevel::Auto => None,
        ApprovalLevel::Confirm => Some("this action requires an approved toolCallId before it will run".to_string()),
        ApprovalLevel::Danger => Some("this action is destructive and requires both an approved toolCallId and admin permission".to_string()),
    };
    Ok(Json(ToolMetadata {
        tool_name: def.name.clone(),
        category: def.category,
        approval_level: def.approval_level,
        requires_approval: def.approval_level != ApprovalLevel::Auto,
        warning,
        impact: None,
    }))
}

#[derive(Deserialize)]
pub struct ExecuteToolRequest {
    #[serde(rename = "toolCallId")]
    tool_call_id: Option<ToolCallId>,
    #[serde(rename = "toolName")]
    tool_name: String,
    args: Value,
    #[serde(rename = "sessionId")]
    #[allow(dead_code)]
    session_id: Option<String>,
}

#[derive(Serialize)]
pub struct ExecuteToolResponse {
    success: bool,
    data: Value,
    duration: u64,
}

pub async fn post_execute_tool(State(state): State<AppState>, headers: HeaderMap, Json(request): Json<ExecuteToolRequest>) -> Result<Json<ExecuteToolResponse>, ApiError> {
    let tool_call_id = request.tool_call_id.unwrap_or_else(ToolCallId::v4);
    let context = InvocationContext::Api { tool_call_id, has_admin_permission: has_admin_permission(&headers) };

    let started = Instant::now();
    let data = invoke_tool(&state.registry, &state.approvals, state.audit.as_ref(), &request.tool_name, &request.args, context, CancellationToken::new()).await?;
    let duration = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    Ok(Json(ExecuteToolResponse { success: true, data, duration }))
}
