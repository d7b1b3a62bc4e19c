use axum::{
    Json,
    extract::{FromRequestParts, Path, State, rejection::JsonRejection},
    http::{StatusCode, request::Parts},
};
use recipebox::{FavoriteState, LikeState, NewView, RecipeForm, RecipeId, RecipeStore, UserId};
use serde_json::{Value, json};

use crate::AppState;
use crate::auth::{AuthUser, ClientMeta, MaybeUser};
use crate::error::{AppError, AppResult};

/// The `{id}` segment, with malformed ids reported as JSON 400s.
pub struct RecipePath(pub RecipeId);

impl<S: Send + Sync> FromRequestParts<S> for RecipePath {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<RecipeId>::from_request_parts(parts, state).await?;
        Ok(RecipePath(id))
    }
}

/// `GET /api/recipes`: everything the caller owns.
pub async fn list_own<S: RecipeStore>(
    State(state): State<AppState<S>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Value>> {
    let recipes = state.store.owner_recipes(user).await?;
    Ok(Json(json!({ "recipes": recipes })))
}

/// `POST /api/recipes`
pub async fn create<S: RecipeStore>(
    State(state): State<AppState<S>>,
    AuthUser(user): AuthUser,
    payload: Result<Json<RecipeForm>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let Json(form) = payload?;
    let recipe = form.validate()?;
    let created = state.store.create_recipe(user, recipe).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Рецепт успешно добавлен!",
            "recipe": created,
        })),
    ))
}

/// `GET /api/recipes/{id}`
///
/// Unlisted recipes are only shown to their owner; everyone else gets 404.
pub async fn show<S: RecipeStore>(
    State(state): State<AppState<S>>,
    MaybeUser(viewer): MaybeUser,
    RecipePath(id): RecipePath,
) -> AppResult<Json<Value>> {
    let recipe = state.store.get_recipe(id).await?;
    if !recipe.is_listed() && viewer != Some(recipe.user_id) {
        return Err(recipebox::Error::NotFound { entity: "recipe", id }.into());
    }
    Ok(Json(json!({ "recipe": recipe })))
}

/// `DELETE /api/recipes/{id}`
pub async fn delete<S: RecipeStore>(
    State(state): State<AppState<S>>,
    AuthUser(user): AuthUser,
    RecipePath(id): RecipePath,
) -> AppResult<Json<Value>> {
    state.store.delete_recipe(id, user).await?;
    Ok(Json(json!({ "message": "Рецепт удалён" })))
}

async fn set_visibility<S: RecipeStore>(
    state: &AppState<S>,
    user: UserId,
    id: RecipeId,
    is_public: bool,
) -> AppResult<Json<Value>> {
    let recipe = state.store.set_visibility(id, user, is_public).await?;
    Ok(Json(json!({ "recipe": recipe })))
}

/// `POST /api/recipes/{id}/publish`
pub async fn publish<S: RecipeStore>(
    State(state): State<AppState<S>>,
    AuthUser(user): AuthUser,
    RecipePath(id): RecipePath,
) -> AppResult<Json<Value>> {
    set_visibility(&state, user, id, true).await
}

/// `POST /api/recipes/{id}/unpublish`
pub async fn unpublish<S: RecipeStore>(
    State(state): State<AppState<S>>,
    AuthUser(user): AuthUser,
    RecipePath(id): RecipePath,
) -> AppResult<Json<Value>> {
    set_visibility(&state, user, id, false).await
}

/// `POST /api/recipes/{id}/like`
pub async fn like<S: RecipeStore>(
    State(state): State<AppState<S>>,
    AuthUser(user): AuthUser,
    RecipePath(id): RecipePath,
) -> AppResult<Json<LikeState>> {
    Ok(Json(state.store.toggle_like(user, id).await?))
}

/// `POST /api/recipes/{id}/favorite`
pub async fn favorite<S: RecipeStore>(
    State(state): State<AppState<S>>,
    AuthUser(user): AuthUser,
    RecipePath(id): RecipePath,
) -> AppResult<Json<FavoriteState>> {
    Ok(Json(state.store.toggle_favorite(user, id).await?))
}

/// `POST /api/recipes/{id}/views`
pub async fn record_view<S: RecipeStore>(
    State(state): State<AppState<S>>,
    MaybeUser(viewer): MaybeUser,
    client: ClientMeta,
    RecipePath(id): RecipePath,
) -> AppResult<StatusCode> {
    state
        .store
        .record_view(NewView {
            recipe_id: id,
            user_id: viewer,
            ip: client.ip,
            user_agent: client.user_agent,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
