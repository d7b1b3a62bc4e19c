//! Catalog statements.

use recipebox_sql::{Expr, RenderedSql, Select, Source, render};

use super::filter::RECIPE;
use super::{CatalogQuery, Filter, PageRequest};
use crate::Params;

const AUTHOR: &str = "u";

fn col(name: &str) -> Expr {
    Expr::qualified(RECIPE, name)
}

fn from_recipe() -> Select {
    Select::new(Source::aliased("recipe", RECIPE))
}

/// Filters compiled into a single predicate, with the values it needs.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    predicate: Expr,
    params: Params,
    page: PageRequest,
}

impl CompiledQuery {
    pub(super) fn new(query: &CatalogQuery) -> Self {
        let mut params = Params::new();
        let exprs: Vec<Expr> = query.filters.iter().map(|f| f.to_expr(&mut params)).collect();
        let predicate = Expr::all(exprs).unwrap_or_else(|| Filter::Listed.to_expr(&mut params));
        params.insert("limit", i64::from(query.page.limit));
        params.insert(
            "offset",
            i64::try_from(query.page.offset()).unwrap_or(i64::MAX),
        );
        Self {
            predicate,
            params,
            page: query.page,
        }
    }

    pub fn predicate(&self) -> &Expr {
        &self.predicate
    }

    /// Values for every placeholder of both statements.
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn page(&self) -> PageRequest {
        self.page
    }

    /// The requested window, newest first.
    pub fn page_stmt(&self) -> Select {
        from_recipe()
            .all_of(RECIPE)
            .item_as(Expr::qualified(AUTHOR, "name"), "author_name")
            .item_as(col("image_url").is_not_null(), "has_image")
            .inner_join("user", AUTHOR, Expr::qualified(AUTHOR, "id").eq(col("user_id")))
            .filter(self.predicate.clone())
            .order_desc(col("created_at"))
            .order_desc(col("id"))
            .limit(Expr::param("limit"))
            .offset(Expr::param("offset"))
    }

    /// Number of rows matching the same predicate, ignoring the window.
    pub fn count_stmt(&self) -> Select {
        from_recipe()
            .item_as(Expr::CountAll, "total")
            .filter(self.predicate.clone())
    }

    pub fn render_page(&self) -> RenderedSql {
        render(&self.page_stmt())
    }

    pub fn render_count(&self) -> RenderedSql {
        render(&self.count_stmt())
    }
}

/// Distinct categories of listed recipes.
pub fn categories_stmt() -> Select {
    let mut unused = Params::new();
    from_recipe()
        .distinct()
        .item(col("category"))
        .filter(Filter::Listed.to_expr(&mut unused))
        .order_asc(col("category"))
}
