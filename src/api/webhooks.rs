//! Sonarr/Radarr "Connect → Webhook" targets.

use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::models::{RadarrWebhook, SonarrWebhook};
use crate::services::WebhookSummary;

/// `POST /api/webhooks/sonarr`
pub async fn sonarr(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SonarrWebhook>,
) -> Result<Json<ApiResponse<WebhookSummary>>, ApiError> {
    let token = state.shared.child_token();
    let summary = state.shared.webhooks.handle_sonarr(payload, &token).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// `POST /api/webhooks/radarr`
pub async fn radarr(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RadarrWebhook>,
) -> Result<Json<ApiResponse<WebhookSummary>>, ApiError> {
    let token = state.shared.child_token();
    let summary = state.shared.webhooks.handle_radarr(payload, &token).await?;
    Ok(Json(ApiResponse::success(summary)))
}
