//! Request principal
//!
//! Login and sessions live in the fronting auth proxy. It forwards the
//! authenticated user's id in `X-User-Id`; this extractor only resolves that
//! id to a known user.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use goalplan_planner::{Principal, UserId};
use goalplan_store::StoreError;
use tracing::debug;

use crate::error::ApiError;
use crate::routes::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller of a request
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<UserId>().ok())
            .ok_or(ApiError::Unauthorized)?;

        let user = state.store.get_user(user_id).map_err(|e| match e {
            StoreError::NotFound { .. } => {
                debug!(user_id, "Unknown user in request header");
                ApiError::Unauthorized
            }
            other => other.into(),
        })?;

        Ok(AuthUser(Principal::from(&user)))
    }
}
