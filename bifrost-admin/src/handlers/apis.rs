use crate::handlers::err_response;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use bifrost_core::{BifrostError, Route};
use bifrost_store::ApiRepository;
use serde_json::{json, Value};

/// GET /v1/apis
pub async fn list(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.apis.get_all().await {
        Ok(routes) => (StatusCode::OK, Json(json!({"list": routes, "total": routes.len()}))),
        Err(e) => err_response(e),
    }
}

/// GET /v1/apis/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    match state.apis.get(&id).await {
        Ok(Some(r)) => (StatusCode::OK, Json(json!(r))),
        Ok(None) => err_response(BifrostError::NotFound(format!("api {id}"))),
        Err(e) => err_response(e),
    }
}

/// POST /v1/apis
pub async fn create(State(state): State<AppState>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let route: Route = match serde_json::from_value(body) {
        Ok(r) => r,
        Err(e) => return err_response(BifrostError::InvalidData(e.to_string())),
    };
    match state.apis.insert(route.clone()).await {
        Ok(()) => (StatusCode::CREATED, Json(json!(route))),
        Err(e) => err_response(e),
    }
}

/// PUT /v1/apis/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    body["id"] = json!(id);
    let route: Route = match serde_json::from_value(body) {
        Ok(r) => r,
        Err(e) => return err_response(BifrostError::InvalidData(e.to_string())),
    };
    match state.apis.update(route.clone()).await {
        Ok(()) => (StatusCode::OK, Json(json!(route))),
        Err(e) => err_response(e),
    }
}

/// DELETE /v1/apis/:id
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    match state.apis.delete(&id).await {
        Ok(()) => (StatusCode::OK, Json(json!({"deleted": true}))),
        Err(e) => err_response(e),
    }
}

/// POST /v1/apis/reload — rebuild the live `RouteSet` from the store.
pub async fn reload(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.apis.get_all().await {
        Ok(routes) => {
            let count = routes.len();
            state.routes.reload(routes);
            (StatusCode::OK, Json(json!({"reloaded": count})))
        }
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

    fn route_body(id: &str) -> Value {
        json!({
            "id": id,
            "name": id,
            "request_host": "*",
            "request_path": "/",
            "target_url": "http://backend.local",
        })
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let state = state();
        let (status, _) = create(State(state.clone()), Json(route_body("r1"))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, Json(body)) = get(State(state), Path("r1".into())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "r1");
    }

    #[tokio::test]
    async fn reload_pushes_store_contents_into_route_set() {
        let state = state();
        create(State(state.clone()), Json(route_body("r1"))).await;
        assert_eq!(state.routes.snapshot().len(), 0);

        let (status, Json(body)) = reload(State(state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reloaded"], 1);
        assert_eq!(state.routes.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn delete_missing_api_is_still_ok() {
        let (status, _) = delete(State(state()), Path("missing".into())).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn get_missing_api_is_404() {
        let (status, Json(body)) = get(State(state()), Path("missing".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "not_found");
    }
}
