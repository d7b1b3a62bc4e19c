use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Everything a handler can fail with.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] recipebox::Error),

    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] JsonRejection),

    #[error("malformed path: {0}")]
    MalformedPath(#[from] PathRejection),

    #[error("malformed query: {0}")]
    MalformedQuery(#[from] QueryRejection),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        use recipebox::Error as E;

        match self {
            AppError::MalformedPayload(_)
            | AppError::MalformedPath(_)
            | AppError::MalformedQuery(_) => StatusCode::BAD_REQUEST,
            AppError::Store(err) => match err {
                E::Validation(_) => StatusCode::BAD_REQUEST,
                E::Unauthenticated => StatusCode::UNAUTHORIZED,
                E::Forbidden(_) => StatusCode::FORBIDDEN,
                E::NotFound { .. } => StatusCode::NOT_FOUND,
                E::Conflict(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
