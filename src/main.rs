// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::document_store::DocumentStore;
use crate::application::sensor_service::SensorService;
use crate::infrastructure::config::{AppConfig, StoreBackend, load_app_config};
use crate::infrastructure::firestore_repository::FirestoreRepository;
use crate::infrastructure::json_store::JsonDocumentStore;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    export_all_csv, export_tag_csv, get_battery, get_series, get_session, health_check,
    list_tags, recent_readings, reload_session, select_session_tag, set_session_range,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing, RUST_LOG overrides the default filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sensor_dashboard=debug,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = load_app_config()?;
    let settings = config.pipeline.settings()?;
    let default_range = config.pipeline.default_range()?;

    // Create repository (infrastructure layer)
    let store = build_store(&config)?;

    // Create services (application layer)
    let sensor_service = SensorService::new(store, settings);

    // Create application state
    let state = Arc::new(AppState::new(
        sensor_service,
        default_range,
        config.server.session_limits(),
    ));

    // Build router (presentation layer)
    // Tag exports are Brotli-encoded by their response builder, so no
    // CompressionLayer is installed on top of it.
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/tags", get(list_tags))
        .route("/tags/:id/series", get(get_series))
        .route("/tags/:id/battery", get(get_battery))
        .route("/tags/:id/export.csv", get(export_tag_csv))
        .route("/readings/recent", get(recent_readings))
        .route("/export.csv", get(export_all_csv))
        .route("/sessions/:sid", get(get_session))
        .route("/sessions/:sid/reload", post(reload_session))
        .route("/sessions/:sid/tag", put(select_session_tag))
        .route("/sessions/:sid/range", put(set_session_range))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config.server.listen.parse()?;
    tracing::info!("Starting sensor-dashboard service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}

fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.store.backend {
        StoreBackend::Firestore => {
            let firestore = &config.store.firestore;
            if firestore.project_id.is_empty() {
                anyhow::bail!("store.firestore.project_id must be set for the firestore backend");
            }
            tracing::info!(
                "Using Firestore collection {} in project {}",
                config.store.collection,
                firestore.project_id
            );
            Arc::new(FirestoreRepository::new(firestore, &config.store.collection)?)
        }
        StoreBackend::JsonFile => {
            Arc::new(JsonDocumentStore::load(&config.store.json_file.path)?)
        }
    };
    Ok(store)
}
