//! Manual wallet-guard evaluation

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{error, info};

use super::common::ApiResponse;
use crate::application::services::{PollingOutcome, PollingWalletGuard};

#[derive(Clone)]
pub struct BillingState {
    pub guard: Arc<PollingWalletGuard>,
}

/// `POST /api/billing/evaluate/{id_tag}`: run the polling guard for one
/// account now, outside the regular tick.
pub async fn evaluate(
    State(state): State<BillingState>,
    Path(id_tag): Path<String>,
) -> (StatusCode, Json<ApiResponse<PollingOutcome>>) {
    info!(id_tag = id_tag.as_str(), "Manual wallet evaluation requested");
    match state.guard.evaluate(&id_tag).await {
        Ok(outcome) => (StatusCode::OK, Json(ApiResponse::success(outcome))),
        Err(e) => {
            error!(id_tag = id_tag.as_str(), error = %e, "Manual wallet evaluation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}
