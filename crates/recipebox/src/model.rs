//! Domain records.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub type UserId = i64;
pub type RecipeId = i64;

/// Cooking time used when a recipe is created without one.
pub const DEFAULT_TIME: &str = "30 мин";
/// Servings used when a recipe is created without a positive count.
pub const DEFAULT_SERVINGS: i32 = 2;
/// Difficulty used when a recipe is created without one.
pub const DEFAULT_DIFFICULTY: &str = "Средняя";

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration data. The hash is produced by whatever issues credentials.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

/// A stored recipe, including private and unapproved ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub user_id: UserId,
    pub title: String,
    pub category: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: String,
    pub time: String,
    pub servings: i32,
    pub difficulty: String,
    pub image_url: Option<String>,
    pub is_approved: bool,
    pub is_public: bool,
    pub views_count: i32,
    pub likes_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recipe {
    /// Whether the recipe shows up in the public catalog.
    pub fn is_listed(&self) -> bool {
        self.is_public && self.is_approved
    }
}

/// A catalog entry: the recipe plus what the listing shows about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeSummary {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub author_name: String,
    pub has_image: bool,
}

/// Recipe fields as submitted by a client. Everything is optional here;
/// [`RecipeForm::validate`] decides what is acceptable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecipeForm {
    pub title: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<String>,
    pub time: Option<String>,
    pub servings: Option<i32>,
    pub difficulty: Option<String>,
    pub image_url: Option<String>,
}

/// A validated recipe, ready to insert.
///
/// Only [`RecipeForm::validate`] constructs one, so every insert has passed
/// validation before any storage access.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    title: String,
    category: String,
    description: String,
    ingredients: Vec<String>,
    instructions: String,
    time: String,
    servings: i32,
    difficulty: String,
    image_url: Option<String>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    trimmed(value).ok_or_else(|| Error::Validation(format!("{field} is required")))
}

impl RecipeForm {
    pub fn validate(self) -> Result<NewRecipe> {
        let title = required(self.title, "title")?;
        let category = required(self.category, "category")?;
        let description = required(self.description, "description")?;
        let ingredients: Vec<String> = self
            .ingredients
            .unwrap_or_default()
            .into_iter()
            .filter_map(|i| trimmed(Some(i)))
            .collect();
        if ingredients.is_empty() {
            return Err(Error::Validation(
                "at least one ingredient is required".to_owned(),
            ));
        }
        let instructions = required(self.instructions, "instructions")?;

        Ok(NewRecipe {
            title,
            category,
            description,
            ingredients,
            instructions,
            time: trimmed(self.time).unwrap_or_else(|| DEFAULT_TIME.to_owned()),
            servings: self
                .servings
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_SERVINGS),
            difficulty: trimmed(self.difficulty).unwrap_or_else(|| DEFAULT_DIFFICULTY.to_owned()),
            image_url: trimmed(self.image_url),
        })
    }
}

impl NewRecipe {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn ingredients(&self) -> &[String] {
        &self.ingredients
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn time(&self) -> &str {
        &self.time
    }

    pub fn servings(&self) -> i32 {
        self.servings
    }

    pub fn difficulty(&self) -> &str {
        &self.difficulty
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
}

/// What creation hands back to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedRecipe {
    pub id: RecipeId,
    pub title: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub likes_count: i32,
}

/// Outcome of a favorite toggle. The like follows the favorite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FavoriteState {
    pub favorited: bool,
    pub liked: bool,
    pub likes_count: i32,
}

/// A recipe in a user's favorites list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FavoriteRecipe {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub author_name: String,
    pub favorited_at: DateTime<Utc>,
}

/// A view event to append.
#[derive(Debug, Clone, PartialEq)]
pub struct NewView {
    pub recipe_id: RecipeId,
    pub user_id: Option<UserId>,
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}
