//! Maps `CirrusError` to an HTTP response: every `ErrorKind` maps to one
//! status. The mapping itself lives on `ErrorKind::http_status`, this is
//! just the `IntoResponse` wiring. Nothing downstream of this module reasons
//! about status codes.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cirrus_error::CirrusError;
use serde::Serialize;

pub struct ApiError(pub CirrusError);

impl From<CirrusError> for ApiError {
    fn from(err: CirrusError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.kind().http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody { code: self.0.code(), message: self.0.message() };
        (status, Json(body)).into_response()
    }
}
