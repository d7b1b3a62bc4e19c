//! Statement builders.
//!
//! Only the shapes recipebox issues are modelled: selects with inner joins,
//! inserts that may ignore conflicts, and filtered updates and deletes.

use crate::expr::Expr;
use crate::{ColumnName, TableName};

/// What a SELECT reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Table {
        name: TableName,
        alias: Option<TableName>,
    },
    /// `unnest(array) AS alias`, one row per array element.
    Unnest { array: Expr, alias: TableName },
}

impl Source {
    pub fn table(name: impl Into<TableName>) -> Self {
        Source::Table {
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<TableName>, alias: impl Into<TableName>) -> Self {
        Source::Table {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    pub fn unnest(array: Expr, alias: impl Into<TableName>) -> Self {
        Source::Unnest {
            array,
            alias: alias.into(),
        }
    }
}

/// One output column of a SELECT.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Expr {
        expr: Expr,
        alias: Option<ColumnName>,
    },
    /// `table.*`
    AllOf(TableName),
}

/// `INNER JOIN table alias ON cond`
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: TableName,
    pub alias: TableName,
    pub on: Expr,
}

/// Filters added with `filter` are joined with AND, in call order.
fn and_filter(current: &mut Option<Expr>, expr: Expr) {
    *current = Some(match current.take() {
        Some(existing) => existing.and(expr),
        None => expr,
    });
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub(crate) distinct: bool,
    pub(crate) items: Vec<SelectItem>,
    pub(crate) source: Source,
    pub(crate) joins: Vec<Join>,
    pub(crate) filter: Option<Expr>,
    /// Sort keys; `true` means descending.
    pub(crate) order: Vec<(Expr, bool)>,
    pub(crate) limit: Option<Expr>,
    pub(crate) offset: Option<Expr>,
}

impl Select {
    /// `SELECT * FROM source` until items are added.
    pub fn new(source: Source) -> Self {
        Self {
            distinct: false,
            items: Vec::new(),
            source,
            joins: Vec::new(),
            filter: None,
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn item(mut self, expr: Expr) -> Self {
        self.items.push(SelectItem::Expr { expr, alias: None });
        self
    }

    /// `expr AS alias`
    pub fn item_as(mut self, expr: Expr, alias: impl Into<ColumnName>) -> Self {
        self.items.push(SelectItem::Expr {
            expr,
            alias: Some(alias.into()),
        });
        self
    }

    /// `table.*`
    pub fn all_of(mut self, table: impl Into<TableName>) -> Self {
        self.items.push(SelectItem::AllOf(table.into()));
        self
    }

    pub fn inner_join(
        mut self,
        table: impl Into<TableName>,
        alias: impl Into<TableName>,
        on: Expr,
    ) -> Self {
        self.joins.push(Join {
            table: table.into(),
            alias: alias.into(),
            on,
        });
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        and_filter(&mut self.filter, expr);
        self
    }

    pub fn order_asc(mut self, expr: Expr) -> Self {
        self.order.push((expr, false));
        self
    }

    pub fn order_desc(mut self, expr: Expr) -> Self {
        self.order.push((expr, true));
        self
    }

    pub fn limit(mut self, expr: Expr) -> Self {
        self.limit = Some(expr);
        self
    }

    pub fn offset(mut self, expr: Expr) -> Self {
        self.offset = Some(expr);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub(crate) table: TableName,
    pub(crate) values: Vec<(ColumnName, Expr)>,
    /// Conflict target of `ON CONFLICT (...) DO NOTHING`.
    pub(crate) ignore_conflicts: Option<Vec<ColumnName>>,
    pub(crate) returning: Vec<ColumnName>,
}

impl Insert {
    pub fn into(table: impl Into<TableName>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
            ignore_conflicts: None,
            returning: Vec::new(),
        }
    }

    pub fn value(mut self, column: impl Into<ColumnName>, expr: Expr) -> Self {
        self.values.push((column.into(), expr));
        self
    }

    pub fn on_conflict_do_nothing(mut self, target: impl IntoIterator<Item = ColumnName>) -> Self {
        self.ignore_conflicts = Some(target.into_iter().collect());
        self
    }

    pub fn returning(mut self, columns: impl IntoIterator<Item = ColumnName>) -> Self {
        self.returning.extend(columns);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub(crate) table: TableName,
    pub(crate) set: Vec<(ColumnName, Expr)>,
    pub(crate) filter: Option<Expr>,
    pub(crate) returning: Vec<ColumnName>,
}

impl Update {
    pub fn table(table: impl Into<TableName>) -> Self {
        Self {
            table: table.into(),
            set: Vec::new(),
            filter: None,
            returning: Vec::new(),
        }
    }

    pub fn set(mut self, column: impl Into<ColumnName>, expr: Expr) -> Self {
        self.set.push((column.into(), expr));
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        and_filter(&mut self.filter, expr);
        self
    }

    pub fn returning(mut self, columns: impl IntoIterator<Item = ColumnName>) -> Self {
        self.returning.extend(columns);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub(crate) table: TableName,
    pub(crate) filter: Option<Expr>,
}

impl Delete {
    pub fn table(table: impl Into<TableName>) -> Self {
        Self {
            table: table.into(),
            filter: None,
        }
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        and_filter(&mut self.filter, expr);
        self
    }
}
