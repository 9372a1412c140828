use crate::handlers;
use crate::middleware::api_key_auth;
use axum::extract::State;
use axum::routing::{get, post};
use axum::Router as AxumRouter;
use bifrost_core::{BifrostConfig, CorsPolicy, RouteSet, ServiceSet};
use bifrost_observability::metrics::MetricsCollector;
use bifrost_store::{ApiRepository, ConsumerRepository, CorsRepository, ServiceRepository, TokenRepository};
use std::sync::{Arc, RwLock};
use tracing::info;

/// Shared state for the admin API.
///
/// `routes`/`services`/`cors` are the same `Arc`s handed to the proxy's
/// `SharedState` — a reload here is visible on the data plane without a
/// second round-trip.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteSet>,
    pub services: Arc<ServiceSet>,
    pub cors: Arc<RwLock<CorsPolicy>>,
    pub consumers: Arc<dyn ConsumerRepository>,
    pub tokens: Arc<dyn TokenRepository>,
    pub apis: Arc<dyn ApiRepository>,
    pub service_repo: Arc<dyn ServiceRepository>,
    pub cors_repo: Arc<dyn CorsRepository>,
    pub config: Arc<BifrostConfig>,
    pub metrics: Arc<MetricsCollector>,
}

/// Admin REST API server, bound separately from the proxy data plane.
pub struct AdminServer {
    addr: String,
    state: AppState,
}

impl AdminServer {
    pub fn new(addr: impl Into<String>, state: AppState) -> Self {
        Self { addr: addr.into(), state }
    }

    /// Build the Axum router with all admin routes.
    fn build_router(&self) -> AxumRouter {
        let v1 = AxumRouter::new()
            .route("/consumers", get(handlers::consumers::lookup).post(handlers::consumers::create))
            .route("/consumers/count", get(handlers::consumers::count))
            .route(
                "/consumers/{id}",
                get(handlers::consumers::get)
                    .put(handlers::consumers::update)
                    .delete(handlers::consumers::delete),
            )
            .route(
                "/tokens",
                get(handlers::tokens::lookup).post(handlers::tokens::create).delete(handlers::tokens::delete_by_consumer),
            )
            .route(
                "/tokens/{key}",
                get(handlers::tokens::get).put(handlers::tokens::update).delete(handlers::tokens::delete),
            )
            .route("/apis", get(handlers::apis::list).post(handlers::apis::create))
            .route("/apis/reload", post(handlers::apis::reload))
            .route(
                "/apis/{id}",
                get(handlers::apis::get).put(handlers::apis::update).delete(handlers::apis::delete),
            )
            .route("/services", get(handlers::services::list).post(handlers::services::create))
            .route("/services/reload", post(handlers::services::reload))
            .route("/services/{id}", get(handlers::services::get).delete(handlers::services::delete))
            .route("/services/{id}/upstreams", post(handlers::services::register_upstream))
            .route(
                "/services/{id}/upstreams/{name}",
                axum::routing::delete(handlers::services::unregister_upstream),
            )
            .route("/configs/cors", get(handlers::cors::get).put(handlers::cors::put))
            .route("/configs/cors/reload", post(handlers::cors::reload))
            .route_layer(axum::middleware::from_fn_with_state(self.state.clone(), api_key_auth));

        AxumRouter::new()
            .route("/status", get(handlers::status::status))
            .route("/metrics", get(metrics_handler))
            .nest("/v1", v1)
            .with_state(self.state.clone())
    }

    /// Start the admin API server.
    pub async fn start(self) -> anyhow::Result<()> {
        let addr = self.addr.clone();
        let app = self.build_router();

        info!(%addr, "starting admin API server");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.gather_text()
}
