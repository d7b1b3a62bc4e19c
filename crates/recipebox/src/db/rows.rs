//! Row mapping from Postgres rows to domain records.

use tokio_postgres::{Error, Row};

use crate::{CreatedRecipe, FavoriteRecipe, Recipe, RecipeSummary, User};

/// Columns of `recipe`, in table order.
pub(crate) const RECIPE_COLUMNS: &[&str] = &[
    "id",
    "user_id",
    "title",
    "category",
    "description",
    "ingredients",
    "instructions",
    "time",
    "servings",
    "difficulty",
    "image_url",
    "is_approved",
    "is_public",
    "views_count",
    "likes_count",
    "created_at",
    "updated_at",
];

pub(crate) const USER_COLUMNS: &[&str] = &[
    "id",
    "email",
    "name",
    "password_hash",
    "created_at",
    "updated_at",
];

pub(crate) fn user(row: &Row) -> Result<User, Error> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) fn recipe(row: &Row) -> Result<Recipe, Error> {
    Ok(Recipe {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        category: row.try_get("category")?,
        description: row.try_get("description")?,
        ingredients: row.try_get("ingredients")?,
        instructions: row.try_get("instructions")?,
        time: row.try_get("time")?,
        servings: row.try_get("servings")?,
        difficulty: row.try_get("difficulty")?,
        image_url: row.try_get("image_url")?,
        is_approved: row.try_get("is_approved")?,
        is_public: row.try_get("is_public")?,
        views_count: row.try_get("views_count")?,
        likes_count: row.try_get("likes_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) fn summary(row: &Row) -> Result<RecipeSummary, Error> {
    Ok(RecipeSummary {
        recipe: recipe(row)?,
        author_name: row.try_get("author_name")?,
        has_image: row.try_get("has_image")?,
    })
}

pub(crate) fn favorite(row: &Row) -> Result<FavoriteRecipe, Error> {
    Ok(FavoriteRecipe {
        recipe: recipe(row)?,
        author_name: row.try_get("author_name")?,
        favorited_at: row.try_get("favorited_at")?,
    })
}

pub(crate) fn created(row: &Row) -> Result<CreatedRecipe, Error> {
    Ok(CreatedRecipe {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        category: row.try_get("category")?,
        created_at: row.try_get("created_at")?,
    })
}
