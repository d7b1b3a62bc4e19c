use axum::{Json, extract::State};
use recipebox::RecipeStore;
use serde_json::{Value, json};

use crate::AppState;
use crate::auth::AuthUser;
use crate::error::AppResult;

/// `GET /api/favorites`: the caller's favorites, most recent first.
pub async fn list<S: RecipeStore>(
    State(state): State<AppState<S>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Value>> {
    let favorites = state.store.favorites(user).await?;
    Ok(Json(json!({ "favorites": favorites })))
}
