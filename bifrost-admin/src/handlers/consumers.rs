use crate::handlers::err_response;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use bifrost_core::{BifrostError, Consumer};
use bifrost_store::ConsumerRepository;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct UsernameQuery {
    app: String,
    username: String,
}

#[derive(Deserialize)]
pub struct AppQuery {
    app: String,
}

/// GET /v1/consumers?app=&username=
pub async fn lookup(State(state): State<AppState>, Query(q): Query<UsernameQuery>) -> (StatusCode, Json<Value>) {
    match state.consumers.get_by_username(&q.app, &q.username).await {
        Ok(Some(c)) => (StatusCode::OK, Json(json!(c))),
        Ok(None) => err_response(BifrostError::NotFound(format!("consumer {}/{}", q.app, q.username))),
        Err(e) => err_response(e),
    }
}

/// GET /v1/consumers/count?app=
pub async fn count(State(state): State<AppState>, Query(q): Query<AppQuery>) -> (StatusCode, Json<Value>) {
    match state.consumers.count(&q.app).await {
        Ok(n) => (StatusCode::OK, Json(json!({"app": q.app, "count": n}))),
        Err(e) => err_response(e),
    }
}

/// GET /v1/consumers/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    match state.consumers.get(&id).await {
        Ok(Some(c)) => (StatusCode::OK, Json(json!(c))),
        Ok(None) => err_response(BifrostError::NotFound(format!("consumer {id}"))),
        Err(e) => err_response(e),
    }
}

/// POST /v1/consumers
pub async fn create(State(state): State<AppState>, Json(mut body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body.get("id").and_then(Value::as_str).map(str::is_empty).unwrap_or(true) {
        body["id"] = json!(Uuid::new_v4().to_string());
    }
    let consumer: Consumer = match serde_json::from_value(body) {
        Ok(c) => c,
        Err(e) => return err_response(BifrostError::InvalidData(e.to_string())),
    };
    match state.consumers.insert(consumer.clone()).await {
        Ok(()) => (StatusCode::CREATED, Json(json!(consumer))),
        Err(e) => err_response(e),
    }
}

/// PUT /v1/consumers/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    body["id"] = json!(id);
    let consumer: Consumer = match serde_json::from_value(body) {
        Ok(c) => c,
        Err(e) => return err_response(BifrostError::InvalidData(e.to_string())),
    };
    match state.consumers.update(consumer.clone()).await {
        Ok(()) => (StatusCode::OK, Json(json!(consumer))),
        Err(e) => err_response(e),
    }
}

/// DELETE /v1/consumers/:id
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    match state.consumers.delete(&id).await {
        Ok(()) => (StatusCode::OK, Json(json!({"deleted": true}))),
        Err(e) => err_response(e),
    }
}
