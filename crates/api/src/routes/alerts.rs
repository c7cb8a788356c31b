//! Alert Routes

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use alerting::{AlertDraft, AlertQuery, SweepReport};
use storage::{Alert, AlertSummary};

use crate::auth::CurrentActor;
use crate::error::ApiError;
use crate::AppState;

/// Response for the threshold check endpoint
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: SweepReport,
}

/// List alerts visible to the caller
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    query: Result<Query<AlertQuery>, QueryRejection>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::Validation(e.body_text()))?;
    Ok(Json(state.ledger.list(&query, &actor).await?))
}

/// Create an alert by hand
pub async fn create_alert(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    draft: Result<Json<AlertDraft>, JsonRejection>,
) -> Result<Json<Alert>, ApiError> {
    let Json(draft) = draft.map_err(|e| ApiError::Validation(e.body_text()))?;
    Ok(Json(state.ledger.create(draft, &actor).await?))
}

pub async fn get_alert(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
) -> Result<Json<Alert>, ApiError> {
    Ok(Json(state.ledger.get(id, &actor).await?))
}

pub async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
) -> Result<Json<Alert>, ApiError> {
    Ok(Json(state.ledger.acknowledge(id, &actor).await?))
}

pub async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
) -> Result<Json<Alert>, ApiError> {
    Ok(Json(state.ledger.resolve(id, &actor).await?))
}

/// Aggregate alert counts
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    CurrentActor(_actor): CurrentActor,
) -> Result<Json<AlertSummary>, ApiError> {
    Ok(Json(state.ledger.summary().await?))
}

/// Run one threshold sweep. Intended for an external scheduler.
pub async fn check_thresholds(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CheckResponse>, ApiError> {
    let report = state.sweep.run().await?;
    Ok(Json(CheckResponse {
        message: format!("Checked thresholds, created {} alerts", report.created),
        report,
    }))
}
