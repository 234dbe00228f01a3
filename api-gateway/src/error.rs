//! HTTP error mapping for store and planner failures

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use goalplan_planner::PlanError;
use goalplan_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or unknown user")]
    Unauthorized,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("plan generation failed: {0}")]
    Plan(#[from] PlanError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Store(StoreError::Invalid(_)) => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Plan(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            if status == StatusCode::BAD_GATEWAY {
                warn!(error = %self, "Upstream failure");
            } else {
                error!(error = %self, "Request failed");
            }
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(StoreError::NotFound { entity: "goal", id: 4 }).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StoreError::Conflict("taken".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StoreError::Invalid("blank".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(PlanError::NoJsonFound { snippet: "nope".into() }).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_plan_error_message_kept() {
        let err = ApiError::from(PlanError::Upstream {
            status: 500,
            body: "model crashed".into(),
        });
        assert!(err.to_string().contains("model crashed"));
    }
}
