use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use super::responses::{ApiResponse, ApiResult, ok};
use super::AppState;
use crate::history_store::History;
use crate::utils::error::AppError;
use crate::models::{CheckResult, MonitorConfig, MonitorStatus, NewProduct, PriceObservation, Product, ProductKey, UpdateProduct};

#[derive(Debug, Serialize, Deserialize)]
pub struct MonitoringChange {
    /// False when the engine was already in the requested state.
    pub changed: bool,
    pub status: MonitorStatus,
}

pub async fn get_status(State(state): State<AppState>) -> ApiResult<MonitorStatus> {
    ok(state.engine.status().await)
}

// Products

pub async fn list_products(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    ok(state.config_store.get_products().await)
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<NewProduct>,
) -> Result<(StatusCode, Json<ApiResponse<Product>>), AppError> {
    let product = state.config_store.add_product(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product))))
}

pub async fn get_product(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Product> {
    ok(state.config_store.get_product(&ProductKey::Id(id)).await?)
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<UpdateProduct>,
) -> ApiResult<Product> {
    ok(state.config_store.update_product(&ProductKey::Id(id), update).await?)
}

pub async fn delete_product(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Product> {
    ok(state.config_store.delete_product(&ProductKey::Id(id)).await?)
}

pub async fn get_product_at(State(state): State<AppState>, Path(index): Path<usize>) -> ApiResult<Product> {
    ok(state.config_store.get_product(&ProductKey::Index(index)).await?)
}

pub async fn update_product_at(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Json(update): Json<UpdateProduct>,
) -> ApiResult<Product> {
    ok(state.config_store.update_product(&ProductKey::Index(index), update).await?)
}

pub async fn delete_product_at(State(state): State<AppState>, Path(index): Path<usize>) -> ApiResult<Product> {
    ok(state.config_store.delete_product(&ProductKey::Index(index)).await?)
}

// Monitoring

pub async fn start_monitoring(State(state): State<AppState>) -> ApiResult<MonitoringChange> {
    let changed = state.engine.start().await;
    ok(MonitoringChange {
        changed,
        status: state.engine.status().await,
    })
}

pub async fn stop_monitoring(State(state): State<AppState>) -> ApiResult<MonitoringChange> {
    let changed = state.engine.stop().await;
    ok(MonitoringChange {
        changed,
        status: state.engine.status().await,
    })
}

pub async fn check_now(State(state): State<AppState>) -> ApiResult<Vec<CheckResult>> {
    ok(state.engine.run_cycle_now().await?)
}

pub async fn last_results(State(state): State<AppState>) -> ApiResult<Vec<CheckResult>> {
    ok(state.engine.last_results())
}

// Settings

pub async fn get_config(State(state): State<AppState>) -> ApiResult<MonitorConfig> {
    ok(state.config_store.get_monitor_config().await)
}

pub async fn update_config(
    State(state): State<AppState>,
    Json(config): Json<MonitorConfig>,
) -> ApiResult<MonitorConfig> {
    let saved = state.config_store.update_monitor_config(config).await?;
    tracing::info!("Check interval set to {} minutes", saved.check_interval_minutes);
    ok(saved)
}

// History

pub async fn get_history(State(state): State<AppState>) -> ApiResult<History> {
    ok(state.history.read_all().await)
}

pub async fn get_product_history(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Vec<PriceObservation>> {
    ok(state.history.read(&name).await)
}
