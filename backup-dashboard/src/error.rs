use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use backup_core::CoreError;
use serde_json::json;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(id) => AppError::NotFound(format!("Backup {id} not found")),
            e @ (CoreError::Conflict(_)
            | CoreError::NotRestorable { .. }
            | CoreError::InvalidTransition { .. }
            | CoreError::NonMonotonic(_)
            | CoreError::Terminal(_)) => AppError::Conflict(e.to_string()),
            e => AppError::Internal(e.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };
        (status, Json(json!({ "error": msg }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backup_core::{BackupId, BackupStatus};

    #[test]
    fn test_core_error_mapping() {
        let not_found: AppError = CoreError::NotFound(BackupId(4)).into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let conflict: AppError = CoreError::Conflict("busy".into()).into();
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let strict: AppError = CoreError::NotRestorable {
            id: BackupId(1),
            status: BackupStatus::Failed,
        }
        .into();
        assert_eq!(strict.into_response().status(), StatusCode::CONFLICT);

        let internal: AppError = CoreError::Config("bad".into()).into();
        assert_eq!(
            internal.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
