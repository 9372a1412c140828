//! Bifrost — zero-overhead API gateway and reverse proxy.
//!
//! Architecture: monoio thread-per-core data plane + axum admin control
//! plane on a dedicated tokio thread, sharing one route/service/CORS
//! snapshot between the two.

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use bifrost_admin::{AdminServer, AppState};
use bifrost_core::{BifrostConfig, CorsPolicy, RouteSet, ServiceSet};
use bifrost_observability::gelf::LogSink;
use bifrost_observability::metrics::MetricsCollector;
use bifrost_proxy::worker::{self, SharedState};
use bifrost_store::{ApiRepository, MemoryStore, ServiceRepository};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::info;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Parser, Debug)]
#[command(name = "bifrost", version, about = "Bifrost — zero-overhead API gateway")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level, used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of proxy worker threads. Defaults to the available parallelism.
    #[arg(long)]
    workers: Option<usize>,

    /// Admin API bind address.
    #[arg(long, default_value = "0.0.0.0:8001")]
    admin_addr: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "bifrost starting");

    let config = BifrostConfig::load(cli.config.as_ref().and_then(|p| p.to_str()))?;
    let config = Arc::new(config);

    let num_workers = cli.workers.unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));
    info!(workers = num_workers, "worker count resolved");

    let store = Arc::new(MemoryStore::new());

    let (initial_routes, initial_services) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(async { anyhow::Ok((ApiRepository::get_all(store.as_ref()).await?, ServiceRepository::get_all(store.as_ref()).await?)) })?;

    let routes = Arc::new(RouteSet::new(initial_routes));
    let services = Arc::new(ServiceSet::new(initial_services));
    let cors = Arc::new(RwLock::new(CorsPolicy::default()));
    let metrics = Arc::new(MetricsCollector::new()?);

    let access_log = if config.logs.access_log {
        LogSink::spawn(config.logs.target.connection_string.clone(), hostname())
    } else {
        LogSink::disabled()
    };
    let application_log = if config.logs.application_log {
        LogSink::spawn(config.logs.target.connection_string.clone(), hostname())
    } else {
        LogSink::disabled()
    };

    let shared = Arc::new(SharedState {
        routes: Arc::clone(&routes),
        services: Arc::clone(&services),
        cors: Arc::clone(&cors),
        consumers: store.clone(),
        tokens: store.clone(),
        apis: store.clone(),
        service_repo: store.clone(),
        cors_repo: store.clone(),
        config: Arc::clone(&config),
        metrics: Arc::clone(&metrics),
        access_log,
        application_log,
    });

    let admin_state = AppState {
        routes: Arc::clone(&routes),
        services: Arc::clone(&services),
        cors: Arc::clone(&cors),
        consumers: store.clone(),
        tokens: store.clone(),
        apis: store.clone(),
        service_repo: store.clone(),
        cors_repo: store,
        config: Arc::clone(&config),
        metrics: Arc::clone(&metrics),
    };

    let admin_addr = cli.admin_addr.clone();
    std::thread::Builder::new()
        .name("bifrost-admin".to_string())
        .spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build tokio runtime for admin");
            rt.block_on(async {
                if let Err(e) = AdminServer::new(admin_addr, admin_state).start().await {
                    tracing::error!(error = %e, "admin API failed");
                }
            });
        })
        .expect("failed to spawn admin thread");

    let mut worker_handles = Vec::new();
    for bind_addr in &config.binds {
        worker_handles.extend(worker::spawn_workers(Arc::clone(&shared), bind_addr.clone(), num_workers));
    }

    info!(workers = num_workers, binds = ?config.binds, admin_addr = %cli.admin_addr, "bifrost is ready");

    setup_signal_handler();
    while !SHUTDOWN.load(Ordering::Relaxed) {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    info!("shutdown signal received, stopping");
    drop(worker_handles);
    info!("bifrost stopped");
    Ok(())
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "bifrost".to_string())
}

fn setup_signal_handler() {
    for sig in [libc::SIGTERM, libc::SIGINT] {
        unsafe {
            libc::signal(sig, signal_handler as libc::sighandler_t);
        }
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}
