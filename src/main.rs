use adcomm::api::{self, AppState};
use adcomm::cache::CacheLayer;
use adcomm::config::Config;
use adcomm::db::init_db;
use adcomm::domain::AdvertiserId;
use adcomm::orchestration::{DiagnosticRecomputer, RangeBounds, RefreshCoordinator};
use adcomm::recordstore::{AdvertiserRoster, HttpRecordStore, RecordStore, StaticRoster};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize cache storage
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let cache = CacheLayer::new(pool.clone());
    let store: Arc<dyn RecordStore> = Arc::new(HttpRecordStore::new(
        config.record_store_url.clone(),
        Duration::from_millis(config.record_store_timeout_ms),
    ));
    let roster: Arc<dyn AdvertiserRoster> = Arc::new(StaticRoster::new(
        config
            .advertisers
            .iter()
            .map(|a| AdvertiserId::new(a.clone()))
            .collect(),
    ));
    let bounds = RangeBounds::new(config.min_date);

    let coordinator = RefreshCoordinator::new(store.clone(), roster.clone(), cache.clone(), bounds);
    let diagnostic = DiagnosticRecomputer::new(store, roster, cache, bounds);

    // Create router
    let app = api::create_router(AppState::new(config, coordinator, diagnostic, pool));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
