//! API Server
//!
//! Wires storage, game services and the websocket gateway together and
//! serves them over HTTP.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
    websocket::WebSocketManager,
};
use crate::{
    config::{HazardConfig, ServerConfig, StorageBackend, StorageConfig},
    context::{GameContext, SharedRng},
    errors::HazardResult,
    scheduler::TokioScheduler,
    storage::RocksStorage,
    store::{MemoryStore, RocksStore, Store},
};
use std::{fs, net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Open the configured store backend
pub fn open_store(config: &StorageConfig) -> HazardResult<Arc<dyn Store>> {
    match config.backend {
        StorageBackend::Memory => {
            info!("💾 Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Rocksdb => {
            if config.clear_on_start {
                warn!("⚠️  Clearing database at {}", config.data_directory);
                let _ = fs::remove_dir_all(&config.data_directory);
            } else {
                info!("📦 Preserving existing data at {}", config.data_directory);
            }
            let storage = RocksStorage::open(&config.data_directory)?;
            Ok(Arc::new(RocksStore::new(storage)))
        }
    }
}

/// Build the shared state for a live server
pub fn build_state(config: HazardConfig) -> HazardResult<Arc<AppState>> {
    let store = open_store(&config.storage)?;
    let websocket_manager = Arc::new(WebSocketManager::new());
    let ctx = GameContext::new(
        config,
        store,
        websocket_manager.clone(),
        Arc::new(TokioScheduler),
        SharedRng::from_entropy(),
    )?;
    Ok(Arc::new(AppState::new(ctx, websocket_manager)))
}

/// Router with the full middleware stack
pub fn create_app(state: Arc<AppState>, config: &ServerConfig) -> axum::Router {
    create_router(state)
        // Request ID middleware (first for tracing)
        .layer(axum::middleware::from_fn(request_id_middleware))

        // CORS layer (before timeout to handle preflight)
        .layer(create_cors_layer(config.allowed_origins.clone()))

        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))

        // Tracing layer (last for complete request tracing)
        .layer(TraceLayer::new_for_http())
}

pub struct HazardServer {
    config: HazardConfig,
}

impl HazardServer {
    pub fn new(config: HazardConfig) -> Self {
        Self { config }
    }

    /// Start the game loops and serve until a shutdown signal
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        // A subscriber may already be installed when embedded
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| self.config.monitoring.log_filter.as_str().into()),
            )
            .try_init();

        info!("🚀 Starting Hazard game server v{}", env!("CARGO_PKG_VERSION"));

        let server_config = self.config.server.clone();
        let addr = socket_addr(&server_config)?;
        let state = build_state(self.config)?;

        let roulette = state.roulette.clone();
        let roulette_task = tokio::spawn(roulette.run());

        let app = create_app(state, &server_config);
        log_server_info(&server_config, addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("✅ Hazard server listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        roulette_task.abort();
        info!("🛑 Hazard server stopped gracefully");
        Ok(())
    }
}

fn socket_addr(config: &ServerConfig) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    Ok(SocketAddr::from((
        config.host.parse::<std::net::IpAddr>()?,
        config.port,
    )))
}

fn log_server_info(config: &ServerConfig, addr: SocketAddr) {
    info!("📋 Server Configuration:");
    info!("   Listen: {}", addr);
    info!("   CORS: {:?}", config.allowed_origins);
    info!("   Request timeout: {}s", config.request_timeout_secs);

    info!("📊 Available endpoints:");
    info!("   GET  /fetchRouletteData   - Current round and bets");
    info!("   POST /bet                 - Place a roulette bet");
    info!("   POST /cases/:id/open      - Open a case");
    info!("   POST /createBattle        - Create a case battle");
    info!("   GET  /battles             - Active battles");
    info!("   GET  /ws                  - Live events");
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
