//! Account API handlers
//!
//! Status, snapshot, forced refresh, interval changes and scenario execution.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::SuccessResponse;
use crate::accounts::AccountHandle;
use crate::api::AppState;
use crate::error::AppError;
use crate::models::HasReadings;

#[derive(Deserialize)]
pub struct UpdateIntervalRequest {
    pub seconds: u64,
}

async fn find_account(state: &AppState, name: &str) -> Result<Arc<AccountHandle>, AppError> {
    state
        .accounts
        .get(name)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Account {} not found", name)))
}

/// GET /api/accounts - Status of every ready account
pub async fn list_accounts(State(state): State<AppState>) -> impl IntoResponse {
    let mut statuses = Vec::new();
    for handle in state.accounts.list().await {
        statuses.push(serde_json::json!({
            "account": handle.name,
            "organization_id": handle.api.organization_id(),
            "status": handle.scheduler.status().await,
        }));
    }
    Json(statuses)
}

/// GET /api/accounts/:name
pub async fn get_account(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = find_account(&state, &name).await?;
    Ok(Json(serde_json::json!({
        "account": handle.name,
        "organization_id": handle.api.organization_id(),
        "status": handle.scheduler.status().await,
    })))
}

/// DELETE /api/accounts/:name - Stop polling and drop the account
pub async fn remove_account(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !state.accounts.remove(&name).await {
        return Err(AppError::NotFound(format!("Account {} not found", name)));
    }
    Ok(Json(SuccessResponse::new(format!("Account {} removed", name))))
}

/// GET /api/accounts/:name/snapshot - Last committed snapshot
pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = find_account(&state, &name).await?;
    let snapshot = handle.scheduler.data().await;
    Ok(Json(snapshot.as_ref().clone()))
}

/// GET /api/accounts/:name/readings - Numeric readings per device
pub async fn get_readings(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = find_account(&state, &name).await?;
    let snapshot = handle.scheduler.data().await;

    let devices: Vec<_> = snapshot
        .devices
        .iter()
        .map(|device| {
            let data = snapshot.device_data_for(device.id);
            let raw = snapshot.raw_data_for(device.id);
            serde_json::json!({
                "id": device.id,
                "title": device.title,
                "class": device.class,
                "measured_at": data.and_then(|d| d.measured_at()),
                "summary": data.map(|d| d.payload.summary()),
                "readings": data.map(|d| d.numeric_readings()).unwrap_or_default(),
                "raw_readings": raw.map(|d| d.numeric_readings()).unwrap_or_default(),
            })
        })
        .collect();

    Ok(Json(devices))
}

/// POST /api/accounts/:name/refresh - Run a cycle now and return its result
pub async fn trigger_refresh(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = find_account(&state, &name).await?;
    tracing::info!("[API] Forced refresh for account {}", name);

    let snapshot = handle.scheduler.refresh_now().await?;
    Ok(Json(snapshot.as_ref().clone()))
}

/// PUT /api/accounts/:name/interval
pub async fn update_interval(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<UpdateIntervalRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.seconds == 0 {
        return Err(AppError::BadRequest(
            "Interval must be at least 1 second".to_string(),
        ));
    }

    let handle = find_account(&state, &name).await?;
    handle
        .scheduler
        .set_update_interval(Duration::from_secs(req.seconds));

    Ok(Json(SuccessResponse::new(format!(
        "Update interval set to {} seconds",
        req.seconds
    ))))
}

/// GET /api/accounts/:name/gaps - Devices currently missing data
pub async fn get_data_gaps(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = find_account(&state, &name).await?;
    let status = handle.data_gaps().await?;
    Ok(Json(status))
}

/// POST /api/accounts/:name/scenarios/:id/execute
pub async fn execute_scenario(
    State(state): State<AppState>,
    Path((name, scenario_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let handle = find_account(&state, &name).await?;

    let known = handle
        .scheduler
        .data()
        .await
        .scenarios
        .iter()
        .any(|s| s.id == scenario_id);
    if !known {
        return Err(AppError::NotFound(format!(
            "Scenario {} not found",
            scenario_id
        )));
    }

    handle.execute_scenario(scenario_id).await?;
    Ok(Json(SuccessResponse::new(format!(
        "Scenario {} execution requested",
        scenario_id
    ))))
}
