use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;

use super::{ApiResponse, AppState, CadenceStatus, HealthResponse, SystemStatus};

/// `GET /api/system/health`
pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse { status: "ok" }))
}

/// `GET /api/system/status`
///
/// Version, uptime, enabled features and the scheduler's per-cadence state.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<SystemStatus>> {
    let config = state.shared.config();
    let cadences = state
        .shared
        .schedule
        .snapshot()
        .into_iter()
        .map(|(cadence, state)| CadenceStatus { cadence, state })
        .collect();

    Json(ApiResponse::success(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        movies_enabled: state.shared.sweeps.has_movies(),
        validate_urls: config.stream.validate_urls,
        scheduler_enabled: config.scheduler.enabled,
        cadences,
    }))
}
