//! Telemetry Routes

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use alerting::IngestReport;
use storage::Reading;

use crate::error::ApiError;
use crate::AppState;

/// Store one sensor reading
pub async fn ingest_reading(
    State(state): State<Arc<AppState>>,
    reading: Result<Json<Reading>, JsonRejection>,
) -> Result<Json<IngestReport>, ApiError> {
    let Json(reading) = reading.map_err(|e| ApiError::Validation(e.body_text()))?;
    Ok(Json(state.sweep.ingest(reading).await?))
}
