//! Caller identity
//!
//! Authentication happens upstream; the gateway forwards the resolved user
//! id and role as headers. Every actor seen here is mirrored into the user
//! directory so fan-out can find them.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;
use tracing::debug;

use storage::{Actor, Role};

use crate::error::ApiError;
use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated caller of a request
#[derive(Debug, Clone, Copy)]
pub struct CurrentActor(pub Actor);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| ApiError::Unauthenticated(format!("missing {} header", name)))?
        .to_str()
        .map_err(|_| ApiError::Unauthenticated(format!("malformed {} header", name)))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id: i64 = header(parts, USER_ID_HEADER)?
            .trim()
            .parse()
            .map_err(|_| {
                ApiError::Unauthenticated(format!("malformed {} header", USER_ID_HEADER))
            })?;
        let role: Role = header(parts, USER_ROLE_HEADER)?
            .trim()
            .parse()
            .map_err(|e: storage::InvalidValue| ApiError::Unauthenticated(e.to_string()))?;

        state.directory.upsert_user(user_id, role).await?;
        debug!(user_id, role = role.as_str(), "Request actor resolved");

        Ok(CurrentActor(Actor::new(user_id, role)))
    }
}
