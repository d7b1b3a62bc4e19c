//! In-memory store.
//!
//! Mirrors the Postgres schema closely enough for tests: the like counter
//! moves only when a like row is added or removed, and deleting a recipe
//! drops its likes, favorites and views.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::catalog::CatalogQuery;
use crate::{
    CatalogRows, CreatedRecipe, Error, FavoriteRecipe, FavoriteState, LikeState, NewRecipe,
    NewUser, NewView, Recipe, RecipeId, RecipeStore, RecipeSummary, Result, User, UserId,
};

#[derive(Debug)]
struct Favorite {
    seq: u64,
    favorited_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    seq: u64,
    users: BTreeMap<UserId, User>,
    recipes: BTreeMap<RecipeId, Recipe>,
    likes: BTreeSet<(UserId, RecipeId)>,
    favorites: BTreeMap<(UserId, RecipeId), Favorite>,
    views: Vec<NewView>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn recipe_mut(&mut self, id: RecipeId) -> Result<&mut Recipe> {
        self.recipes
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("recipe", id))
    }

    fn owned_recipe_mut(&mut self, id: RecipeId, owner: UserId) -> Result<&mut Recipe> {
        let recipe = self.recipe_mut(id)?;
        if recipe.user_id != owner {
            return Err(Error::Forbidden("recipe"));
        }
        Ok(recipe)
    }

    fn author_name(&self, owner: UserId) -> String {
        self.users
            .get(&owner)
            .map(|u| u.name.clone())
            .unwrap_or_default()
    }

    /// Add or remove a like row; the counter follows, one step at a time.
    fn set_like(&mut self, user: UserId, recipe: RecipeId, liked: bool) -> Result<i32> {
        let changed = if liked {
            self.likes.insert((user, recipe))
        } else {
            self.likes.remove(&(user, recipe))
        };
        let row = self.recipe_mut(recipe)?;
        if changed {
            row.likes_count += if liked { 1 } else { -1 };
        }
        Ok(row.likes_count)
    }
}

/// A [`RecipeStore`] that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

/// Rows that reference a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependents {
    pub likes: usize,
    pub favorites: usize,
    pub views: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the like, favorite and view rows that reference `recipe`.
    pub fn dependents(&self, recipe: RecipeId) -> Dependents {
        let t = self.tables();
        Dependents {
            likes: t.likes.iter().filter(|(_, r)| *r == recipe).count(),
            favorites: t.favorites.keys().filter(|(_, r)| *r == recipe).count(),
            views: t.views.iter().filter(|v| v.recipe_id == recipe).count(),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_created_at(&self, recipe: RecipeId, at: chrono::DateTime<Utc>) {
        if let Some(row) = self.tables().recipes.get_mut(&recipe) {
            row.created_at = at;
        }
    }
}

fn newest_first(a: &Recipe, b: &Recipe) -> std::cmp::Ordering {
    (b.created_at, b.id).cmp(&(a.created_at, a.id))
}

impl RecipeStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut t = self.tables();
        if t.users.values().any(|u| u.email == user.email) {
            return Err(Error::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        let now = Utc::now();
        let id = t.next_id() as UserId;
        let user = User {
            id,
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        t.users.insert(id, user.clone());
        Ok(user)
    }

    async fn create_recipe(&self, owner: UserId, recipe: NewRecipe) -> Result<CreatedRecipe> {
        let mut t = self.tables();
        if !t.users.contains_key(&owner) {
            return Err(Error::not_found("user", owner));
        }
        let now = Utc::now();
        let id = t.next_id() as RecipeId;
        let row = Recipe {
            id,
            user_id: owner,
            title: recipe.title().to_owned(),
            category: recipe.category().to_owned(),
            description: recipe.description().to_owned(),
            ingredients: recipe.ingredients().to_vec(),
            instructions: recipe.instructions().to_owned(),
            time: recipe.time().to_owned(),
            servings: recipe.servings(),
            difficulty: recipe.difficulty().to_owned(),
            image_url: recipe.image_url().map(str::to_owned),
            is_approved: false,
            is_public: false,
            views_count: 0,
            likes_count: 0,
            created_at: now,
            updated_at: now,
        };
        let created = CreatedRecipe {
            id,
            title: row.title.clone(),
            category: row.category.clone(),
            created_at: now,
        };
        t.recipes.insert(id, row);
        Ok(created)
    }

    async fn get_recipe(&self, id: RecipeId) -> Result<Recipe> {
        self.tables().recipe_mut(id).map(|r| r.clone())
    }

    async fn owner_recipes(&self, owner: UserId) -> Result<Vec<Recipe>> {
        let t = self.tables();
        let mut rows: Vec<Recipe> = t
            .recipes
            .values()
            .filter(|r| r.user_id == owner)
            .cloned()
            .collect();
        rows.sort_by(newest_first);
        Ok(rows)
    }

    async fn catalog_page(&self, query: &CatalogQuery) -> Result<CatalogRows> {
        let t = self.tables();
        let mut matching: Vec<&Recipe> = t.recipes.values().filter(|r| query.matches(r)).collect();
        matching.sort_by(|a, b| newest_first(a, b));

        let offset = usize::try_from(query.page.offset()).unwrap_or(usize::MAX);
        let recipes = matching
            .iter()
            .skip(offset)
            .take(query.page.limit as usize)
            .map(|r| RecipeSummary {
                recipe: (*r).clone(),
                author_name: t.author_name(r.user_id),
                has_image: r.image_url.is_some(),
            })
            .collect();
        Ok(CatalogRows {
            recipes,
            total: matching.len() as u64,
        })
    }

    async fn categories(&self) -> Result<Vec<String>> {
        let t = self.tables();
        let categories: BTreeSet<&str> = t
            .recipes
            .values()
            .filter(|r| r.is_listed())
            .map(|r| r.category.as_str())
            .collect();
        Ok(categories.into_iter().map(str::to_owned).collect())
    }

    async fn toggle_like(&self, user: UserId, recipe: RecipeId) -> Result<LikeState> {
        let mut t = self.tables();
        t.recipe_mut(recipe)?;
        let liked = !t.likes.contains(&(user, recipe));
        let likes_count = t.set_like(user, recipe, liked)?;
        Ok(LikeState { liked, likes_count })
    }

    async fn toggle_favorite(&self, user: UserId, recipe: RecipeId) -> Result<FavoriteState> {
        let mut t = self.tables();
        t.recipe_mut(recipe)?;
        let favorited = t.favorites.remove(&(user, recipe)).is_none();
        if favorited {
            let seq = t.next_id();
            t.favorites.insert(
                (user, recipe),
                Favorite {
                    seq,
                    favorited_at: Utc::now(),
                },
            );
        }
        let likes_count = t.set_like(user, recipe, favorited)?;
        Ok(FavoriteState {
            favorited,
            liked: favorited,
            likes_count,
        })
    }

    async fn favorites(&self, user: UserId) -> Result<Vec<FavoriteRecipe>> {
        let t = self.tables();
        let mut rows: Vec<(&Favorite, &Recipe)> = t
            .favorites
            .iter()
            .filter(|((u, _), _)| *u == user)
            .filter_map(|((_, r), fav)| t.recipes.get(r).map(|recipe| (fav, recipe)))
            .collect();
        rows.sort_by(|(a, _), (b, _)| (b.favorited_at, b.seq).cmp(&(a.favorited_at, a.seq)));
        Ok(rows
            .into_iter()
            .map(|(fav, recipe)| FavoriteRecipe {
                recipe: recipe.clone(),
                author_name: t.author_name(recipe.user_id),
                favorited_at: fav.favorited_at,
            })
            .collect())
    }

    async fn set_visibility(
        &self,
        recipe: RecipeId,
        owner: UserId,
        is_public: bool,
    ) -> Result<Recipe> {
        let mut t = self.tables();
        let row = t.owned_recipe_mut(recipe, owner)?;
        row.is_public = is_public;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete_recipe(&self, recipe: RecipeId, owner: UserId) -> Result<()> {
        let mut t = self.tables();
        t.owned_recipe_mut(recipe, owner)?;
        t.recipes.remove(&recipe);
        t.likes.retain(|(_, r)| *r != recipe);
        t.favorites.retain(|(_, r), _| *r != recipe);
        t.views.retain(|v| v.recipe_id != recipe);
        Ok(())
    }

    async fn record_view(&self, view: NewView) -> Result<()> {
        let mut t = self.tables();
        t.recipe_mut(view.recipe_id)?.views_count += 1;
        t.views.push(view);
        Ok(())
    }

    async fn set_approval(&self, recipe: RecipeId, approved: bool) -> Result<Recipe> {
        let mut t = self.tables();
        let row = t.recipe_mut(recipe)?;
        row.is_approved = approved;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecipeForm;

    async fn store_with_recipe() -> (MemoryStore, UserId, RecipeId) {
        let store = MemoryStore::new();
        let owner = store
            .create_user(NewUser {
                email: "ann@example.com".into(),
                name: "Ann".into(),
                password_hash: "x".into(),
            })
            .await
            .unwrap();
        let form = RecipeForm {
            title: Some("Borscht".into()),
            category: Some("Soups".into()),
            description: Some("Beet soup".into()),
            ingredients: Some(vec!["beet".into()]),
            instructions: Some("Boil.".into()),
            ..Default::default()
        };
        let created = store
            .create_recipe(owner.id, form.validate().unwrap())
            .await
            .unwrap();
        (store, owner.id, created.id)
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let (store, _, _) = store_with_recipe().await;
        let err = store
            .create_user(NewUser {
                email: "ann@example.com".into(),
                name: "Other Ann".into(),
                password_hash: "y".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn created_recipe_is_private_and_unapproved() {
        let (store, owner, id) = store_with_recipe().await;
        let recipe = store.get_recipe(id).await.unwrap();
        assert_eq!(recipe.user_id, owner);
        assert!(!recipe.is_public);
        assert!(!recipe.is_approved);
        assert_eq!(recipe.likes_count, 0);
        assert_eq!(recipe.views_count, 0);
    }

    #[tokio::test]
    async fn like_twice_restores_count() {
        let (store, owner, id) = store_with_recipe().await;
        let on = store.toggle_like(owner, id).await.unwrap();
        assert_eq!(on, LikeState { liked: true, likes_count: 1 });
        let off = store.toggle_like(owner, id).await.unwrap();
        assert_eq!(off, LikeState { liked: false, likes_count: 0 });
    }

    #[tokio::test]
    async fn like_of_missing_recipe_is_not_found() {
        let (store, owner, _) = store_with_recipe().await;
        let err = store.toggle_like(owner, 9999).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "recipe", id: 9999 }));
    }

    #[tokio::test]
    async fn favorite_drags_like_along() {
        let (store, owner, id) = store_with_recipe().await;
        store.toggle_like(owner, id).await.unwrap();

        // Already liked: favoriting keeps exactly one like.
        let fav = store.toggle_favorite(owner, id).await.unwrap();
        assert_eq!(
            fav,
            FavoriteState {
                favorited: true,
                liked: true,
                likes_count: 1
            }
        );
        assert_eq!(store.favorites(owner).await.unwrap().len(), 1);

        let unfav = store.toggle_favorite(owner, id).await.unwrap();
        assert_eq!(
            unfav,
            FavoriteState {
                favorited: false,
                liked: false,
                likes_count: 0
            }
        );
        assert!(store.favorites(owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn visibility_is_owner_only_and_keeps_approval() {
        let (store, owner, id) = store_with_recipe().await;
        let err = store.set_visibility(id, owner + 100, true).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let published = store.set_visibility(id, owner, true).await.unwrap();
        assert!(published.is_public);
        assert!(!published.is_approved);

        let err = store.set_visibility(4242, owner, true).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_cascades_dependents() {
        let (store, owner, id) = store_with_recipe().await;
        store.toggle_favorite(owner, id).await.unwrap();
        store
            .record_view(NewView {
                recipe_id: id,
                user_id: None,
                ip: None,
                user_agent: Some("curl".into()),
            })
            .await
            .unwrap();
        assert_eq!(
            store.dependents(id),
            Dependents {
                likes: 1,
                favorites: 1,
                views: 1
            }
        );

        assert!(matches!(
            store.delete_recipe(id, owner + 1).await,
            Err(Error::Forbidden(_))
        ));
        store.delete_recipe(id, owner).await.unwrap();
        assert_eq!(
            store.dependents(id),
            Dependents {
                likes: 0,
                favorites: 0,
                views: 0
            }
        );
        assert!(matches!(
            store.get_recipe(id).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn record_view_bumps_counter() {
        let (store, _, id) = store_with_recipe().await;
        for _ in 0..3 {
            store
                .record_view(NewView {
                    recipe_id: id,
                    user_id: None,
                    ip: Some("10.0.0.1".parse().unwrap()),
                    user_agent: None,
                })
                .await
                .unwrap();
        }
        assert_eq!(store.get_recipe(id).await.unwrap().views_count, 3);
    }
}
