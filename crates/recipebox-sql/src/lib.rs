//! Typed SQL for recipebox.
//!
//! Statements are built as values, then rendered to Postgres SQL with
//! numbered placeholders. Parameters are referenced by name: every use of
//! the same name within one statement shares a single `$n`, so a predicate
//! can mention a value several times while the caller binds it once.
//!
//! ```
//! use recipebox_sql::{Expr, Select, Source, render};
//!
//! let stmt = Select::new(Source::table("recipe"))
//!     .item(Expr::column("id"))
//!     .filter(Expr::column("title").ilike(Expr::param("q")))
//!     .filter(Expr::column("category").eq(Expr::param("q")));
//! let sql = render(&stmt);
//! assert_eq!(sql.params.len(), 1);
//! ```

mod expr;
mod query;
mod render;

pub use expr::{ColumnRef, Expr, Op};
pub use query::{Delete, Insert, Join, Select, SelectItem, Source, Update};
pub use render::{Render, SqlWriter, render};

/// A statement rendered to SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSql {
    /// SQL with `$1`, `$2`, ... placeholders.
    pub sql: String,
    /// The parameter behind each placeholder; `params[0]` is `$1`.
    pub params: Vec<ParamName>,
}

macro_rules! sql_name {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

sql_name!(
    /// A table or table alias.
    TableName
);
sql_name!(
    /// A column or output alias.
    ColumnName
);
sql_name!(
    /// A named statement parameter.
    ParamName
);

/// Double-quote an identifier. Identifiers are always quoted, since
/// `user` is a reserved word.
///
/// ```
/// assert_eq!(recipebox_sql::quote_ident("user"), "\"user\"");
/// assert_eq!(recipebox_sql::quote_ident("a\"b"), "\"a\"\"b\"");
/// ```
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a string literal.
///
/// ```
/// assert_eq!(recipebox_sql::quote_literal("it's"), "'it''s'");
/// ```
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `idx_{table}_{columns}`.
///
/// ```
/// assert_eq!(
///     recipebox_sql::index_name("recipe", &["is_public", "is_approved"]),
///     "idx_recipe_is_public_is_approved"
/// );
/// ```
pub fn index_name(table: &str, columns: &[&str]) -> String {
    format!("idx_{table}_{}", columns.join("_"))
}

/// `trg_{table}_{purpose}`, e.g. `trg_recipe_like_count`.
pub fn trigger_name(table: &str, purpose: &str) -> String {
    format!("trg_{table}_{purpose}")
}

/// Name of the function a trigger executes.
pub fn trigger_function_name(table: &str, purpose: &str) -> String {
    format!("trgfn_{table}_{purpose}")
}
