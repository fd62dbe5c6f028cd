//! Health API handler.
//!
//! # Key invariants and assumptions
//! - Health checks must be fast and side-effect free.
//! - No authentication; the response only names the storage backend.
use crate::api::error::{ApiError, api_internal};
use crate::api::types::HealthStatus;
use crate::app::AppState;
use axum::Json;
use axum::extract::State;

#[utoipa::path(
    get,
    path = "/api/health/",
    tag = "system",
    responses(
        (status = 200, description = "Service and storage are healthy", body = HealthStatus),
        (status = 500, description = "Storage unavailable", body = crate::api::types::ErrorResponse)
    )
)]
/// Check that the backing store answers.
pub(crate) async fn health(State(state): State<AppState>) -> Result<Json<HealthStatus>, ApiError> {
    if let Err(err) = state.store.health_check().await {
        return Err(api_internal("storage unavailable", &err));
    }
    Ok(Json(HealthStatus {
        status: "ok".to_string(),
        backend: state.store.backend_name().to_string(),
        durable: state.store.is_durable(),
    }))
}
