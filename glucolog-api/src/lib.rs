//! glucolog-api library - glucose ingestion and query service
//!
//! Ingests time-series glucose measurements from LibreLinkUp on a fixed
//! interval, persists them with timestamp-keyed deduplication, and serves
//! them via query, export, and SSE streaming endpoints.

use axum::routing::{get, post};
use axum::Router;
use glucolog_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod ingest;
pub mod libre;

pub use ingest::Ingestor;

/// Broadcast capacity for change events; a lagging SSE client skips ahead
/// instead of blocking the ingestion cycle
pub const EVENT_BUS_CAPACITY: usize = 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Change-event bus fed by the ingestion scheduler
    pub events: Arc<EventBus>,
    /// Ingestor, shared with the background task for on-demand fetches
    pub ingestor: Arc<Ingestor>,
}

impl AppState {
    pub fn new(db: SqlitePool, events: Arc<EventBus>, ingestor: Arc<Ingestor>) -> Self {
        Self {
            db,
            events,
            ingestor,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/glucose-readings",
            get(api::list_readings)
                .post(api::create_reading)
                .delete(api::delete_collection),
        )
        .route("/api/glucose-readings/bulk", post(api::bulk_import))
        .route("/api/glucose-readings/latest", get(api::latest_reading))
        .route("/api/glucose-readings/export", get(api::export_readings))
        .route("/api/glucose-readings/stream", get(api::event_stream))
        .route("/api/glucose-readings/remote", get(api::fetch_remote))
        .route(
            "/api/glucose-readings/:id",
            get(api::get_reading).delete(api::delete_reading),
        )
        .route("/health", get(api::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
