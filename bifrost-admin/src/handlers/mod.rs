pub mod apis;
pub mod consumers;
pub mod cors;
pub mod services;
pub mod status;
pub mod tokens;

use axum::response::Json;
use axum::http::StatusCode;
use bifrost_core::BifrostError;
use serde_json::Value;

/// Shared `BifrostError` -> wire-contract mapping for every admin handler.
pub fn err_response(e: BifrostError) -> (StatusCode, Json<Value>) {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_slice(&e.to_json_body()).unwrap_or_default();
    (status, Json(body))
}
