//! The public recipe catalog.
//!
//! A listing request becomes a [`CatalogQuery`]: an ordered list of
//! [`Filter`]s plus a page window. The filters are compiled once into a
//! single WHERE expression that the page statement and the count statement
//! both use, so `total` always describes the same rows that are paged
//! through.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{RecipeStore, RecipeSummary, Result};

mod filter;
mod sql;

pub use filter::Filter;
pub use sql::{CompiledQuery, categories_stmt};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 12;

/// The category value that means "no category filter".
pub const ALL_CATEGORIES: &str = "all";

/// Raw listing parameters, as they arrive in a query string.
///
/// Pagination values stay strings so that garbage falls back to the
/// defaults instead of failing the request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogRequest {
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// A 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

fn positive_or(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(default)
}

impl PageRequest {
    /// Lenient parse: absent, non-numeric and non-positive values take the
    /// defaults.
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            page: positive_or(page, DEFAULT_PAGE),
            limit: positive_or(limit, DEFAULT_LIMIT),
        }
    }

    /// Rows skipped before this page.
    pub fn offset(&self) -> u64 {
        (u64::from(self.page) - 1) * u64::from(self.limit)
    }
}

/// Filters and window for one catalog listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub filters: Vec<Filter>,
    pub page: PageRequest,
}

impl CatalogQuery {
    /// A query over every listed recipe.
    pub fn listed(page: PageRequest) -> Self {
        Self {
            filters: vec![Filter::Listed],
            page,
        }
    }

    /// Add a category filter unless it is empty or the `"all"` sentinel.
    pub fn category(mut self, category: Option<&str>) -> Self {
        if let Some(category) = category
            && !category.is_empty()
            && !category.eq_ignore_ascii_case(ALL_CATEGORIES)
        {
            self.filters.push(Filter::CategoryEquals(category.to_owned()));
        }
        self
    }

    /// Add a text search unless the term is empty.
    pub fn search(mut self, term: Option<&str>) -> Self {
        if let Some(term) = term
            && !term.is_empty()
        {
            self.filters.push(Filter::TextContains(term.to_owned()));
        }
        self
    }

    /// Whether a recipe satisfies every filter.
    pub fn matches(&self, recipe: &crate::Recipe) -> bool {
        self.filters.iter().all(|f| f.matches(recipe))
    }

    /// Compile the filters into the shared predicate and both statements.
    pub fn compile(&self) -> CompiledQuery {
        CompiledQuery::new(self)
    }
}

impl From<&CatalogRequest> for CatalogQuery {
    fn from(req: &CatalogRequest) -> Self {
        let page = PageRequest::parse(req.page.as_deref(), req.limit.as_deref());
        CatalogQuery::listed(page)
            .category(req.category.as_deref())
            .search(req.search.as_deref())
    }
}

/// Page metadata returned with every listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: PageRequest, total: u64) -> Self {
        Self {
            page: page.page,
            limit: page.limit,
            total,
            total_pages: total.div_ceil(u64::from(page.limit)),
        }
    }
}

/// One page of the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogPage {
    pub recipes: Vec<RecipeSummary>,
    pub pagination: Pagination,
}

/// Read-only catalog service over a store.
pub struct Catalog<S> {
    store: Arc<S>,
}

impl<S> Clone for Catalog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: RecipeStore> Catalog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// List public, approved recipes matching the request.
    pub async fn list_public_recipes(&self, req: &CatalogRequest) -> Result<CatalogPage> {
        let query = CatalogQuery::from(req);
        tracing::debug!(filters = ?query.filters, page = query.page.page, limit = query.page.limit, "catalog listing");
        let rows = self.store.catalog_page(&query).await?;
        Ok(CatalogPage {
            recipes: rows.recipes,
            pagination: Pagination::new(query.page, rows.total),
        })
    }

    /// Distinct categories among listed recipes, ascending.
    pub async fn list_categories(&self) -> Result<Vec<String>> {
        self.store.categories().await
    }
}
