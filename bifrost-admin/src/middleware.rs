use crate::server::AppState;
use axum::{
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

/// Bearer-token admin authentication: compares `Authorization` against
/// `admin_tokens`. An empty `admin_tokens` list means admin is open.
pub async fn api_key_auth(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if state.config.admin_tokens.is_empty() {
        return Ok(next.run(request).await);
    }

    let presented = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start_matches("Bearer ").trim());

    match presented {
        Some(token) if state.config.admin_tokens.iter().any(|t| t == token) => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
