use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::highlight::HighlightError;

/// Request-level error, rendered as a JSON `{"detail": ...}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("not enough permission")]
    Forbidden,

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Database(sqlx::Error),
}

impl ApiError {
    /// The standard 401 used by the token-validation path.
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("could not validate credentials".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        // Constraint conflicts that slipped past the explicit pre-checks
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return ApiError::Conflict("resource already exists".to_string());
            }
        }
        ApiError::Database(err)
    }
}

impl From<HighlightError> for ApiError {
    fn from(err: HighlightError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                "internal server error".to_string()
            }
            ApiError::Database(err) => {
                tracing::error!(error = %err, "database error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({ "detail": detail }));
        if matches!(self, ApiError::Unauthorized(_)) {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::NotFound("term not found".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("dup".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Validation("bad".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::invalid_credentials().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unauthorized_sets_www_authenticate() {
        let response = ApiError::invalid_credentials().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response
                .headers()
                .get(header::WWW_AUTHENTICATE)
                .map(|v| v.to_str().unwrap_or_default()),
            Some("Bearer")
        );
    }

    #[test]
    fn test_database_error_hides_detail() {
        let err = ApiError::Database(sqlx::Error::PoolClosed);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_highlight_error_maps_to_validation() {
        let err: ApiError = HighlightError::Missing.into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
