//! Manual sweep triggers.
//!
//! Each trigger claims the same cadence slot the scheduler uses, so a manual
//! run never overlaps a scheduled one.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Local;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{ApiError, ApiResponse, AppState, FullSweepQuery};
use crate::services::scheduler::{CadenceId, RunOutcome};
use crate::services::{SweepError, SweepService, SweepSummary, WantedSummary};

/// `POST /api/tasks/wanted`
pub async fn trigger_wanted(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<WantedSummary>>, ApiError> {
    let summary = run_exclusive(&state, CadenceId::WantedSweep, |sweeps, token| async move {
        sweeps.run_wanted(&token).await
    })
    .await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// `POST /api/tasks/wanted/movies`
pub async fn trigger_wanted_movies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SweepSummary>>, ApiError> {
    if !state.shared.sweeps.has_movies() {
        return Err(SweepError::MoviesNotConfigured.into());
    }
    let summary = run_exclusive(&state, CadenceId::WantedSweep, |sweeps, token| async move {
        sweeps.run_wanted_movies(&token).await
    })
    .await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// `POST /api/tasks/full-sweep?onlyMonitored=`
pub async fn trigger_full_sweep(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FullSweepQuery>,
) -> Result<Json<ApiResponse<SweepSummary>>, ApiError> {
    let only_monitored = query
        .only_monitored
        .unwrap_or(state.shared.config().scheduler.full_sweep.only_monitored);

    let summary = run_exclusive(&state, CadenceId::FullSweep, move |sweeps, token| async move {
        sweeps.run_full_sweep(only_monitored, &token).await
    })
    .await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Runs `work` on its own task so the cadence slot is released even if the
/// HTTP client goes away.
async fn run_exclusive<T, F, Fut>(
    state: &AppState,
    cadence: CadenceId,
    work: F,
) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(Arc<SweepService>, CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, SweepError>> + Send + 'static,
{
    let book = Arc::clone(&state.shared.schedule);
    if !book.try_begin(cadence, Local::now(), |_| true) {
        return Err(ApiError::conflict(format!("{cadence} is already running")));
    }

    let run = work(Arc::clone(&state.shared.sweeps), state.shared.child_token());
    let handle = tokio::spawn(async move {
        let result = run.await;
        book.complete(cadence, RunOutcome::from(&result), Local::now());
        result
    });

    handle
        .await
        .map_err(|e| ApiError::internal(format!("{cadence} task failed: {e}")))?
        .map_err(ApiError::from)
}
