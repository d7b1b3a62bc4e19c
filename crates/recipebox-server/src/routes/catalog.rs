use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use recipebox::{CatalogPage, CatalogRequest, RecipeStore};
use serde_json::{Value, json};

use crate::AppState;
use crate::error::AppResult;

/// `GET /api/recipes/public`
///
/// Pagination input is never rejected; bad values fall back to defaults.
/// A key given more than once keeps its first value.
pub async fn list_public<S: RecipeStore>(
    State(state): State<AppState<S>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> AppResult<Json<CatalogPage>> {
    let Query(pairs) = query?;
    let req = catalog_request(pairs);
    Ok(Json(state.catalog.list_public_recipes(&req).await?))
}

fn catalog_request(pairs: Vec<(String, String)>) -> CatalogRequest {
    let mut req = CatalogRequest::default();
    for (key, value) in pairs {
        let slot = match key.as_str() {
            "category" => &mut req.category,
            "search" => &mut req.search,
            "page" => &mut req.page,
            "limit" => &mut req.limit,
            _ => continue,
        };
        slot.get_or_insert(value);
    }
    req
}

/// `GET /api/recipes/categories`
pub async fn categories<S: RecipeStore>(State(state): State<AppState<S>>) -> AppResult<Json<Value>> {
    let categories = state.catalog.list_categories().await?;
    Ok(Json(json!({ "categories": categories })))
}
