//! Recipe catalog and storage.
//!
//! This crate provides:
//! - The public catalog query: one predicate list compiled into a page
//!   statement and a count statement that always agree
//! - The [`RecipeStore`] trait, with a Postgres implementation ([`PgStore`])
//!   and an in-memory one ([`MemoryStore`]) for tests
//! - Schema migrations, including the triggers that keep `likes_count`
//!   in step with the `recipe_like` table
//!
//! # Naming Convention
//!
//! **Table names use singular form** (`user`, `recipe`, `recipe_like`).
//! Junction tables join singular names with an underscore.

pub mod catalog;
pub mod db;
mod error;
mod memory;
mod model;
mod params;
mod store;

pub use catalog::{
    Catalog, CatalogPage, CatalogQuery, CatalogRequest, Filter, PageRequest, Pagination,
};
pub use db::{MIGRATIONS, Migration, PgStore, PoolSettings, mask_password};
pub use error::Error;
pub use memory::{Dependents, MemoryStore};
pub use model::*;
pub use params::{Params, SqlParam, Value};
pub use store::{CatalogRows, RecipeStore};

/// Result type for recipebox operations.
pub type Result<T> = std::result::Result<T, Error>;
