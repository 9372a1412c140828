use crate::handlers::err_response;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use bifrost_core::service::Upstream;
use bifrost_core::{BifrostError, Service};
use bifrost_store::ServiceRepository;
use serde_json::{json, Value};

/// GET /v1/services
pub async fn list(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.service_repo.get_all().await {
        Ok(services) => (StatusCode::OK, Json(json!({"list": services, "total": services.len()}))),
        Err(e) => err_response(e),
    }
}

/// GET /v1/services/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    match state.service_repo.get(&id).await {
        Ok(Some(s)) => (StatusCode::OK, Json(json!(s))),
        Ok(None) => err_response(BifrostError::NotFound(format!("service {id}"))),
        Err(e) => err_response(e),
    }
}

/// POST /v1/services
pub async fn create(State(state): State<AppState>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let service: Service = match serde_json::from_value(body) {
        Ok(s) => s,
        Err(e) => return err_response(BifrostError::InvalidData(e.to_string())),
    };
    let id = service.id.clone();
    match state.service_repo.insert(service).await {
        Ok(()) => match state.service_repo.get(&id).await {
            Ok(Some(s)) => (StatusCode::CREATED, Json(json!(s))),
            _ => (StatusCode::CREATED, Json(json!({"id": id}))),
        },
        Err(e) => err_response(e),
    }
}

/// DELETE /v1/services/:id
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    match state.service_repo.delete(&id).await {
        Ok(()) => (StatusCode::OK, Json(json!({"deleted": true}))),
        Err(e) => err_response(e),
    }
}

/// POST /v1/services/:id/upstreams — register or update an upstream by name.
pub async fn register_upstream(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let service = match state.service_repo.get(&id).await {
        Ok(Some(s)) => s,
        Ok(None) => return err_response(BifrostError::NotFound(format!("service {id}"))),
        Err(e) => return err_response(e),
    };
    let upstream: Upstream = match serde_json::from_value(body) {
        Ok(u) => u,
        Err(e) => return err_response(BifrostError::InvalidData(e.to_string())),
    };
    service.register_upstream(upstream);
    (StatusCode::OK, Json(json!(service)))
}

/// DELETE /v1/services/:id/upstreams/:name
pub async fn unregister_upstream(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> (StatusCode, Json<Value>) {
    let service = match state.service_repo.get(&id).await {
        Ok(Some(s)) => s,
        Ok(None) => return err_response(BifrostError::NotFound(format!("service {id}"))),
        Err(e) => return err_response(e),
    };
    service.unregister_upstream(&name);
    (StatusCode::OK, Json(json!(service)))
}

/// POST /v1/services/reload — rebuild the live `ServiceSet` from the store.
pub async fn reload(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.service_repo.get_all().await {
        Ok(services) => {
            let count = services.len();
            state.services.reload(services);
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

    fn service_body(id: &str) -> Value {
        json!({"id": id, "name": id, "upstreams": []})
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let state = state();
        let (status, _) = create(State(state.clone()), Json(service_body("s1"))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, Json(body)) = get(State(state), Path("s1".into())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "s1");
    }

    #[tokio::test]
    async fn register_upstream_is_visible_through_get() {
        let state = state();
        create(State(state.clone()), Json(service_body("s1"))).await;
        let (status, _) = register_upstream(
            State(state.clone()),
            Path("s1".into()),
            Json(json!({"name": "u1", "target_url": "http://u1.local"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, Json(body)) = get(State(state), Path("s1".into())).await;
        assert_eq!(body["upstreams"][0]["name"], "u1");
    }

    #[tokio::test]
    async fn unregister_upstream_removes_by_name() {
        let state = state();
        create(State(state.clone()), Json(service_body("s1"))).await;
        register_upstream(State(state.clone()), Path("s1".into()), Json(json!({"name": "u1", "target_url": "http://u1.local"})))
            .await;
        let (status, Json(body)) = unregister_upstream(State(state.clone()), Path(("s1".into(), "u1".into()))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["upstreams"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reload_pushes_store_contents_into_service_set() {
        let state = state();
        create(State(state.clone()), Json(service_body("s1"))).await;
        assert!(state.services.get("s1").is_none());
        let (status, Json(body)) = reload(State(state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reloaded"], 1);
        assert!(state.services.get("s1").is_some());
    }

    #[tokio::test]
    async fn register_upstream_on_missing_service_is_404() {
        let (status, Json(body)) = register_upstream(
            State(state()),
            Path("missing".into()),
            Json(json!({"name": "u1", "target_url": "http://u1.local"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "not_found");
    }
}
