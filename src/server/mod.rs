pub mod api;

use crate::error::Error;
use crate::models::PipelineConfig;
use crate::services::{
    HttpFetcher, InstrumentPipeline, MemoryCache, SharedCacheTier, SharedPipeline, SqliteCache,
};
use crate::utils::get_public_dir;
use axum::{
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: SharedPipeline,
    /// Memory tier, also registered in the pipeline, kept for usage reporting
    pub memory: Arc<MemoryCache>,
    /// Same mirror list the pipeline downloads from, used for probing
    pub fetcher: Arc<HttpFetcher>,
    pub config: Arc<PipelineConfig>,
    pub persistent_enabled: bool,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wire fetcher, cache tiers and pipeline from configuration
    ///
    /// A configured but unreachable persistent store degrades to memory-only.
    pub async fn from_config(config: PipelineConfig) -> Result<Self, Error> {
        let fetcher = Arc::new(HttpFetcher::from_config(&config)?);

        let memory = Arc::new(MemoryCache::new());
        let mut tiers: Vec<SharedCacheTier> = vec![memory.clone()];
        let persistent = SqliteCache::connect_optional(config.database_url.as_deref()).await;
        let persistent_enabled = persistent.is_some();
        if let Some(store) = persistent {
            tiers.push(store);
        }

        let pipeline = InstrumentPipeline::from_config(fetcher.clone(), tiers, &config);

        Ok(Self {
            pipeline: Arc::new(pipeline),
            memory,
            fetcher,
            config: Arc::new(config),
            persistent_enabled,
            started_at: Utc::now(),
        })
    }
}

/// Build the router with every route, static UI and CORS
pub fn router(state: AppState, public_dir: PathBuf) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/instruments",
            get(api::get_instruments_handler).post(api::refresh_instruments_handler),
        )
        .route("/api/status", get(api::status_handler))
        .route("/api/debug", get(api::debug_handler))
        .route("/api/companies", get(api::companies_handler))
        .route("/api/export", get(api::export_handler))
        .route("/health", get(api::health_handler))
        .nest_service("/public", ServeDir::new(&public_dir))
        .fallback_service(ServeDir::new(&public_dir))
        .layer(cors)
        .with_state(state)
}

/// Start the axum server
pub async fn serve(state: AppState, port: u16) -> Result<(), Error> {
    tracing::info!("Starting tradesymbols server");

    let public_dir = get_public_dir();
    tracing::info!("Using public directory: {}", public_dir.display());

    tracing::info!("Registering routes:");
    tracing::info!("  GET  /api/instruments?refresh=true");
    tracing::info!("  POST /api/instruments");
    tracing::info!("  GET  /api/status");
    tracing::info!("  GET  /api/debug");
    tracing::info!("  GET  /api/companies?search=INFY&segment=all");
    tracing::info!("  GET  /api/export?symbol=INFY&action=bonus");
    tracing::info!("  GET  /health");
    tracing::info!("  GET  /public/* (static files from {})", public_dir.display());

    let app = router(state, public_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
