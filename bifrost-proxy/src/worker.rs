//! Thread-per-core worker topology (5): one OS thread per configured
//! worker, each driving its own monoio runtime and its own `TcpListener`
//! bound to the same address. Workers read the route/service snapshot
//! through `ArcSwap::load` and pick up reloads on their next connection.

use crate::proxy::ConnPool;
use bifrost_core::{BifrostConfig, CorsPolicy, RouteSet, ServiceSet};
use bifrost_observability::gelf::LogSink;
use bifrost_observability::metrics::MetricsCollector;
use bifrost_store::{ApiRepository, ConsumerRepository, CorsRepository, ServiceRepository, TokenRepository};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, RwLock};
use tracing::{error, info};

/// State shared by every worker thread. The route/service sets are the only
/// hot-path-read, admin-write data; everything else is either immutable for
/// the process lifetime or internally synchronized by its own type.
pub struct SharedState {
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
    pub access_log: LogSink,
    pub application_log: LogSink,
}

impl SharedState {
    pub fn cors_snapshot(&self) -> CorsPolicy {
        self.cors.read().expect("cors lock poisoned").clone()
    }

    pub fn set_cors(&self, policy: CorsPolicy) {
        *self.cors.write().expect("cors lock poisoned") = policy;
    }
}

/// Spawn `num_workers` OS threads, each running an independent monoio
/// runtime with its own accept loop.
pub fn spawn_workers(shared: Arc<SharedState>, bind_addr: String, num_workers: usize) -> Vec<std::thread::JoinHandle<()>> {
    let mut handles = Vec::with_capacity(num_workers);

    for worker_id in 0..num_workers {
        let shared = Arc::clone(&shared);
        let addr = bind_addr.clone();

        let handle = std::thread::Builder::new()
            .name(format!("bifrost-worker-{worker_id}"))
            .spawn(move || {
                let mut rt = monoio::RuntimeBuilder::<monoio::FusionDriver>::new()
                    .enable_all()
                    .build()
                    .expect("failed to build monoio runtime");
                rt.block_on(worker_loop(worker_id, shared, addr));
            })
            .expect("failed to spawn worker thread");

        handles.push(handle);
    }

    info!(workers = num_workers, addr = %bind_addr, "proxy workers spawned");
    handles
}

async fn worker_loop(worker_id: usize, shared: Arc<SharedState>, addr: String) {
    use monoio::net::TcpListener;

    let listener = TcpListener::bind(&addr)
        .unwrap_or_else(|e| panic!("worker {worker_id} failed to bind {addr}: {e}"));
    info!(worker = worker_id, addr = %addr, "worker listening");

    let conn_pool = Rc::new(RefCell::new(ConnPool::new(20)));

    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let _ = stream.set_nodelay(true);
                let shared = Arc::clone(&shared);
                let pool = Rc::clone(&conn_pool);

                monoio::spawn(async move {
                    if let Err(e) = crate::connection::handle_connection(stream, peer_addr, shared, pool).await {
                        tracing::debug!(error = %e, "connection closed");
                    }
                });
            }
            Err(e) => error!(worker = worker_id, error = %e, "accept error"),
        }
    }
}
