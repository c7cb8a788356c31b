//! Notification Routes

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use alerting::MAX_PAGE_SIZE;
use storage::{Notification, NotificationFilter};

use crate::auth::CurrentActor;
use crate::error::ApiError;
use crate::AppState;

/// Query parameters for the notifications endpoint
#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    pub is_read: Option<bool>,
    #[serde(default, alias = "skip")]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

impl NotificationQuery {
    fn to_filter(&self) -> NotificationFilter {
        NotificationFilter {
            is_read: self.is_read,
            offset: self.offset,
            limit: Some(self.limit.min(MAX_PAGE_SIZE)),
        }
    }
}

/// The caller's notifications, newest first
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    query: Result<Query<NotificationQuery>, QueryRejection>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::Validation(e.body_text()))?;
    Ok(Json(state.inbox.list(&actor, &query.to_filter()).await?))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<i64>,
) -> Result<Json<Notification>, ApiError> {
    Ok(Json(state.inbox.mark_read(id, &actor).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_capped() {
        let query = NotificationQuery {
            limit: 5000,
            ..Default::default()
        };
        assert_eq!(query.to_filter().limit, Some(MAX_PAGE_SIZE));
    }
}
