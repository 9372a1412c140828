use crate::handlers::err_response;
use crate::server::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use bifrost_core::{BifrostError, CorsPolicy};
use bifrost_store::CorsRepository;
use serde_json::{json, Value};

/// GET /v1/configs/cors
pub async fn get(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.cors_repo.get().await {
        Ok(policy) => (StatusCode::OK, Json(json!(policy))),
        Err(e) => err_response(e),
    }
}

/// PUT /v1/configs/cors
pub async fn put(State(state): State<AppState>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let policy: CorsPolicy = match serde_json::from_value(body) {
        Ok(p) => p,
        Err(e) => return err_response(BifrostError::InvalidData(e.to_string())),
    };
    match state.cors_repo.put(policy.clone()).await {
        Ok(()) => (StatusCode::OK, Json(json!(policy))),
        Err(e) => err_response(e),
    }
}

/// POST /v1/configs/cors/reload — push the stored policy into the live,
/// proxy-visible `CorsPolicy` lock.
pub async fn reload(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.cors_repo.get().await {
        Ok(policy) => {
            *state.cors.write().expect("cors lock poisoned") = policy.clone();
            (StatusCode::OK, Json(json!(policy)))
        }
        Err(e) => err_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bifrost_core::{RouteSet, ServiceSet};
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
    async fn put_then_get_round_trips() {
        let state = state();
        let (status, _) = put(State(state.clone()), Json(json!({"allowed_origins": ["https://a.example"]}))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, Json(body)) = get(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allowed_origins"], json!(["https://a.example"]));
    }

    #[tokio::test]
    async fn reload_pushes_stored_policy_into_live_lock() {
        let state = state();
        put(State(state.clone()), Json(json!({"allowed_origins": ["*"]}))).await;
        assert!(!state.cors.read().unwrap().allows("https://anywhere.example"));

        let (status, _) = reload(State(state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.cors.read().unwrap().allows("https://anywhere.example"));
    }
}
