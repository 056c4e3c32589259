//! Caller identity extraction. Identity-provider integration is explicitly
//! out of scope — this core has no session/cookie layer of its
//! own, so the org and admin-permission claims a real deployment would
//! derive from a verified session are read from plain headers here instead.
//! A deployment wires a real auth layer in front of this thin surface; it is
//! not this crate's job to verify who is asking.

use axum::http::HeaderMap;
use cirrus_core::OrgId;

pub fn caller_org_id(headers: &HeaderMap) -> Option<OrgId> {
    headers.get("x-org-id")?.to_str().ok()?.parse().ok()
}

pub fn has_admin_permission(headers: &HeaderMap) -> bool {
    headers.get("x-admin-permission").and_then(|v| v.to_str().ok()).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}
