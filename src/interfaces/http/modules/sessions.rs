//! Remote session start/stop through the session command facade

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::common::ApiResponse;
use crate::application::services::{
    SessionCommandFacade, StartOutcome, StopReasonStore, STOP_BY_SERVER,
};
use crate::domain::RepositoryProvider;

#[derive(Clone)]
pub struct SessionsState {
    pub facade: Arc<SessionCommandFacade>,
    pub stop_reasons: Arc<StopReasonStore>,
    pub repos: Arc<dyn RepositoryProvider>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub charge_box_id: String,
    #[serde(default = "default_connector")]
    pub connector_id: u32,
    pub id_tag: String,
}

fn default_connector() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopSessionRequest {
    pub transaction_id: i32,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

type ApiResult = (StatusCode, Json<ApiResponse<CommandResponse>>);

fn failure(status: StatusCode, message: impl Into<String>) -> ApiResult {
    (status, Json(ApiResponse::error(message)))
}

/// `POST /api/sessions/start`
pub async fn start_session(
    State(state): State<SessionsState>,
    Json(request): Json<StartSessionRequest>,
) -> ApiResult {
    match state
        .facade
        .start_session(&request.charge_box_id, request.connector_id, &request.id_tag)
        .await
    {
        StartOutcome::Dispatched(status) => {
            let message = if status.is_accepted() {
                "Remote start accepted"
            } else {
                "Remote start rejected by charge point"
            };
            (
                StatusCode::OK,
                Json(ApiResponse::success(CommandResponse {
                    status: status.to_string(),
                    message: Some(message.to_string()),
                })),
            )
        }
        StartOutcome::Rejected(rejection) => {
            failure(StatusCode::CONFLICT, rejection.user_message())
        }
        StartOutcome::Failed(e) => failure(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

/// `POST /api/sessions/stop`: operator stop, recorded as a server stop.
pub async fn stop_session(
    State(state): State<SessionsState>,
    Json(request): Json<StopSessionRequest>,
) -> ApiResult {
    let tx = match state.repos.transactions().find_by_id(request.transaction_id).await {
        Ok(Some(tx)) => tx,
        Ok(None) => {
            return failure(
                StatusCode::NOT_FOUND,
                format!("Transaction {} not found", request.transaction_id),
            )
        }
        Err(e) => return failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    if !tx.is_open() {
        return failure(
            StatusCode::CONFLICT,
            format!("Transaction {} is already stopped", tx.id),
        );
    }

    state.stop_reasons.put(tx.id, STOP_BY_SERVER);
    match state
        .facade
        .stop_session(&tx.connector.charge_box_id, tx.connector.connector_id, tx.id)
        .await
    {
        Ok(status) => (
            StatusCode::OK,
            Json(ApiResponse::success(CommandResponse {
                status: status.to_string(),
                message: None,
            })),
        ),
        Err(e) => {
            state.stop_reasons.take(tx.id);
            warn!(transaction_id = tx.id, error = %e, "Operator stop not delivered");
            failure(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}
