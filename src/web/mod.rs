use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config_store::ConfigStore;
use crate::history_store::HistoryStore;
use crate::scheduler::MonitorEngine;

pub mod handlers;
pub mod responses;

pub use handlers::MonitoringChange;
pub use responses::{ApiError, ApiResponse, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MonitorEngine>,
    pub config_store: Arc<ConfigStore>,
    pub history: Arc<HistoryStore>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(handlers::get_status))
        // Products, by stable id
        .route("/products", get(handlers::list_products).post(handlers::create_product))
        .route(
            "/products/:id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        // Products, by position in the list
        .route(
            "/products/at/:index",
            get(handlers::get_product_at)
                .put(handlers::update_product_at)
                .delete(handlers::delete_product_at),
        )
        // Monitoring lifecycle
        .route("/monitoring/start", post(handlers::start_monitoring))
        .route("/monitoring/stop", post(handlers::stop_monitoring))
        .route("/monitoring/check", post(handlers::check_now))
        .route("/monitoring/results", get(handlers::last_results))
        // Settings and history
        .route("/config", get(handlers::get_config).put(handlers::update_config))
        .route("/history", get(handlers::get_history))
        .route("/history/:name", get(handlers::get_product_history))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "price-watch"
    }))
}
