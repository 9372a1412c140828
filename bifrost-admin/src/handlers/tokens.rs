use crate::handlers::err_response;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use bifrost_core::{BifrostError, Token};
use bifrost_store::TokenRepository;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct ConsumerIdQuery {
    consumer_id: String,
}

/// GET /v1/tokens?consumer_id=
pub async fn lookup(State(state): State<AppState>, Query(q): Query<ConsumerIdQuery>) -> (StatusCode, Json<Value>) {
    match state.tokens.get_by_consumer_id(&q.consumer_id).await {
        Ok(Some(t)) => (StatusCode::OK, Json(json!(t))),
        Ok(None) => err_response(BifrostError::NotFound(format!("token for consumer {}", q.consumer_id))),
        Err(e) => err_response(e),
    }
}

/// GET /v1/tokens/:key
pub async fn get(State(state): State<AppState>, Path(key): Path<String>) -> (StatusCode, Json<Value>) {
    match state.tokens.get(&key).await {
        Ok(Some(t)) => (StatusCode::OK, Json(json!(t))),
        Ok(None) => err_response(BifrostError::NotFound(format!("token {key}"))),
        Err(e) => err_response(e),
    }
}

#[derive(Deserialize)]
pub struct CreateTokenBody {
    consumer_id: String,
    #[serde(default)]
    ip_address: Option<String>,
}

/// POST /v1/tokens — issues a new bearer with `token.timeout` from config.
pub async fn create(State(state): State<AppState>, Json(body): Json<CreateTokenBody>) -> (StatusCode, Json<Value>) {
    let mut token = Token::new(Uuid::new_v4().to_string(), body.consumer_id, state.config.token_timeout());
    token.ip_address = body.ip_address;
    match state.tokens.insert(token.clone()).await {
        Ok(()) => (StatusCode::CREATED, Json(json!(token))),
        Err(e) => err_response(e),
    }
}

/// PUT /v1/tokens/:key
pub async fn update(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(mut body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    body["id"] = json!(key);
    let token: Token = match serde_json::from_value(body) {
        Ok(t) => t,
        Err(e) => return err_response(BifrostError::InvalidData(e.to_string())),
    };
    match state.tokens.update(token.clone()).await {
        Ok(()) => (StatusCode::OK, Json(json!(token))),
        Err(e) => err_response(e),
    }
}

/// DELETE /v1/tokens/:key
pub async fn delete(State(state): State<AppState>, Path(key): Path<String>) -> (StatusCode, Json<Value>) {
    match state.tokens.delete(&key).await {
        Ok(()) => (StatusCode::OK, Json(json!({"deleted": true}))),
        Err(e) => err_response(e),
    }
}

/// DELETE /v1/tokens?consumer_id=
pub async fn delete_by_consumer(
    State(state): State<AppState>,
    Query(q): Query<ConsumerIdQuery>,
) -> (StatusCode, Json<Value>) {
    match state.tokens.delete_by_consumer_id(&q.consumer_id).await {
        Ok(()) => (StatusCode::OK, Json(json!({"deleted": true}))),
        Err(e) => err_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bifrost_core::{CorsPolicy, RouteSet, ServiceSet};
    use bifrost_observability::metrics::MetricsCollector;
    use bifrost_store::MemoryStore;
    use std::sync::{Arc, RwLock};

    fn state() -> AppState {
        let store = Arc::new(MemoryStore::default());
        AppState {
            routes: Arc::new(RouteSet::empty()),
            services: Arc::new(ServiceSet::empty()),
            cors: Arc::new(RwLock::new(CorsPolicy::default())),
            consumers: store.clone(),
            tokens: store.clone(),
            apis: store.clone(),
            service_repo: store.clone(),
            cors_repo: store,
            config: Arc::new(bifrost_core::BifrostConfig::default()),
            metrics: Arc::new(MetricsCollector::new().unwrap()),
        }
    }

    #[tokio::test]
    async fn create_issues_token_with_configured_timeout() {
        let state = state();
        let (status, Json(token)) = create(
            State(state),
            Json(CreateTokenBody { consumer_id: "c1".into(), ip_address: None }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(token["consumer_id"], "c1");
    }

    #[tokio::test]
    async fn lookup_by_consumer_id_finds_issued_token() {
        let state = state();
        create(State(state.clone()), Json(CreateTokenBody { consumer_id: "c1".into(), ip_address: None })).await;
        let (status, _) = lookup(State(state), Query(ConsumerIdQuery { consumer_id: "c1".into() })).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn get_missing_token_is_404() {
        let (status, Json(body)) = get(State(state()), Path("nope".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "not_found");
    }

    #[tokio::test]
    async fn delete_by_consumer_removes_all_that_consumers_tokens() {
        let state = state();
        let (_, Json(t1)) =
            create(State(state.clone()), Json(CreateTokenBody { consumer_id: "c1".into(), ip_address: None })).await;
        delete_by_consumer(State(state.clone()), Query(ConsumerIdQuery { consumer_id: "c1".into() })).await;
        let key = t1["id"].as_str().unwrap().to_string();
        let (status, _) = get(State(state), Path(key)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
