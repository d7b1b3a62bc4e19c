//! The storage seam.

use std::future::Future;

use crate::catalog::CatalogQuery;
use crate::{
    CreatedRecipe, FavoriteRecipe, FavoriteState, LikeState, NewRecipe, NewUser, NewView, Recipe,
    RecipeId, RecipeSummary, Result, User, UserId,
};

/// The rows of one catalog page, and how many rows match in total.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRows {
    pub recipes: Vec<RecipeSummary>,
    pub total: u64,
}

/// Everything the catalog and the HTTP layer need from storage.
///
/// Implemented by [`crate::PgStore`] and [`crate::MemoryStore`].
pub trait RecipeStore: Send + Sync + 'static {
    /// Cheap round trip to prove the store is reachable.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    /// Register a user. A taken email is a `Conflict`.
    fn create_user(&self, user: NewUser) -> impl Future<Output = Result<User>> + Send;

    /// Insert a private, unapproved recipe owned by `owner`.
    fn create_recipe(
        &self,
        owner: UserId,
        recipe: NewRecipe,
    ) -> impl Future<Output = Result<CreatedRecipe>> + Send;

    fn get_recipe(&self, id: RecipeId) -> impl Future<Output = Result<Recipe>> + Send;

    /// All of an owner's recipes, newest first, whatever their visibility.
    fn owner_recipes(&self, owner: UserId) -> impl Future<Output = Result<Vec<Recipe>>> + Send;

    /// One page of the catalog and the matching total, read from a single
    /// snapshot.
    fn catalog_page(&self, query: &CatalogQuery)
    -> impl Future<Output = Result<CatalogRows>> + Send;

    /// Distinct categories of listed recipes, ascending.
    fn categories(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Remove the like if present, add it otherwise.
    fn toggle_like(
        &self,
        user: UserId,
        recipe: RecipeId,
    ) -> impl Future<Output = Result<LikeState>> + Send;

    /// Flip the favorite and bring the like to the same state.
    fn toggle_favorite(
        &self,
        user: UserId,
        recipe: RecipeId,
    ) -> impl Future<Output = Result<FavoriteState>> + Send;

    /// A user's favorites, most recently favorited first.
    fn favorites(&self, user: UserId) -> impl Future<Output = Result<Vec<FavoriteRecipe>>> + Send;

    /// Publish or unpublish. Only the owner may; approval is untouched.
    fn set_visibility(
        &self,
        recipe: RecipeId,
        owner: UserId,
        is_public: bool,
    ) -> impl Future<Output = Result<Recipe>> + Send;

    /// Delete a recipe and, by cascade, everything hanging off it.
    fn delete_recipe(
        &self,
        recipe: RecipeId,
        owner: UserId,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Append a view event and bump the recipe's view counter.
    fn record_view(&self, view: NewView) -> impl Future<Output = Result<()>> + Send;

    /// Moderation: grant or revoke approval.
    fn set_approval(
        &self,
        recipe: RecipeId,
        approved: bool,
    ) -> impl Future<Output = Result<Recipe>> + Send;
}
