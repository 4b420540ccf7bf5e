use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dispatcher::metrics::Metrics;
use dispatcher::services::Dispatcher;
use dispatcher::{config, router, AppState};

/// How often stale tracked requests are swept.
const TRACKER_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);
/// Age after which tracked requests are evicted.
const TRACKER_MAX_AGE_DAYS: i64 = 7;

const DEFAULT_LOG_FILTER: &str = "dispatcher=debug,tower_http=debug,axum=info,warn";

fn init_tracing() {
    // RUST_LOG environment variable controls log levels
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn config_path() -> PathBuf {
    std::env::var("DISPATCHER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yaml"))
}

#[tokio::main]
async fn main() {
    init_tracing();

    tracing::info!("Starting dispatcher v{}", env!("CARGO_PKG_VERSION"));

    let config_path = config_path();
    let config = match config::load(&config_path) {
        Ok(cfg) => {
            tracing::info!(
                path = %config_path.display(),
                nodes = cfg.nodes.len(),
                "Configuration loaded"
            );
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let metrics = match Metrics::new() {
        Ok(metrics) => metrics,
        Err(e) => {
            tracing::error!("Failed to create metrics registry: {}", e);
            std::process::exit(1);
        }
    };

    let addr = server_addr(&config);
    let dispatcher = match Dispatcher::new(Arc::new(config), metrics.clone()) {
        Ok(dispatcher) => Arc::new(dispatcher),
        Err(e) => {
            tracing::error!("Failed to initialize dispatcher: {}", e);
            std::process::exit(1);
        }
    };

    // Sweep stale tracked requests in the background
    {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TRACKER_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let evicted = dispatcher
                    .tracker()
                    .cleanup(chrono::Duration::days(TRACKER_MAX_AGE_DAYS))
                    .await;
                if evicted > 0 {
                    tracing::debug!(evicted, "swept stale tracked requests");
                }
            }
        });
    }

    let state = AppState {
        config_path: Arc::new(config_path),
        dispatcher,
        metrics,
    };

    let app = router(state);

    tracing::info!("Dispatcher listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

fn server_addr(config: &config::AppConfig) -> std::net::SocketAddr {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    let ip = match config.server.host.parse::<IpAddr>() {
        Ok(ip) => ip,
        Err(_) => {
            tracing::warn!(host = %config.server.host, "invalid listen host, using 0.0.0.0");
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        }
    };
    SocketAddr::new(ip, config.server.port)
}
