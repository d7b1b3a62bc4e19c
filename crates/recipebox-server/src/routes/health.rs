use axum::{Json, extract::State, http::StatusCode};
use chrono::{SecondsFormat, Utc};
use recipebox::RecipeStore;
use serde_json::{Value, json};

use crate::AppState;

/// `GET /api/health`: pings the database.
pub async fn check<S: RecipeStore>(State(state): State<AppState<S>>) -> (StatusCode, Json<Value>) {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "message": "Database connection successful",
                "timestamp": timestamp,
            })),
        ),
        Err(err) => {
            tracing::error!(error = %err, "health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": "Database connection failed",
                    "timestamp": timestamp,
                })),
            )
        }
    }
}
