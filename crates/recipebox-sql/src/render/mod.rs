//! Rendering statements to SQL text.

use indexmap::IndexSet;

use crate::expr::{ColumnRef, Expr};
use crate::query::{Delete, Insert, Select, SelectItem, Source, Update};
use crate::{ColumnName, ParamName, RenderedSql, quote_ident, quote_literal};

/// Output buffer plus the parameters seen so far.
///
/// A parameter's placeholder number is its position in `params`, so the
/// first mention of a name fixes its `$n` for the whole statement.
#[derive(Debug, Default)]
pub struct SqlWriter {
    sql: String,
    params: IndexSet<ParamName>,
    /// Subquery nesting. Nested statements are written on one line.
    depth: usize,
}

impl SqlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    pub fn ident(&mut self, name: &str) {
        self.sql.push_str(&quote_ident(name));
    }

    fn placeholder(&mut self, name: &ParamName) {
        let (index, _) = self.params.insert_full(name.clone());
        self.sql.push('$');
        self.sql.push_str(&(index + 1).to_string());
    }

    /// Start a new clause: a line break at top level, a space when nested.
    fn clause(&mut self, keyword: &str) {
        self.sql.push(if self.depth == 0 { '\n' } else { ' ' });
        self.sql.push_str(keyword);
    }

    fn list<T>(&mut self, items: &[T], mut each: impl FnMut(&mut Self, &T)) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            each(self, item);
        }
    }

    fn columns(&mut self, columns: &[ColumnName]) {
        self.list(columns, |w, c| w.ident(c.as_str()));
    }

    fn filter(&mut self, filter: &Option<Expr>) {
        if let Some(expr) = filter {
            self.clause("WHERE ");
            expr.render(self);
        }
    }

    fn returning(&mut self, columns: &[ColumnName]) {
        if !columns.is_empty() {
            self.clause("RETURNING ");
            self.columns(columns);
        }
    }

    pub fn finish(self) -> RenderedSql {
        RenderedSql {
            sql: self.sql,
            params: self.params.into_iter().collect(),
        }
    }
}

/// Anything that can write itself as SQL.
pub trait Render {
    fn render(&self, w: &mut SqlWriter);
}

/// Render a statement, numbering its parameters from `$1`.
pub fn render(stmt: &impl Render) -> RenderedSql {
    let mut w = SqlWriter::new();
    stmt.render(&mut w);
    w.finish()
}

impl Render for ColumnRef {
    fn render(&self, w: &mut SqlWriter) {
        if let Some(table) = &self.table {
            w.ident(table.as_str());
            w.push(".");
        }
        w.ident(self.name.as_str());
    }
}

impl Render for Expr {
    fn render(&self, w: &mut SqlWriter) {
        match self {
            Expr::Param(name) => w.placeholder(name),
            Expr::Column(col) => col.render(w),
            Expr::Text(s) => w.push(&quote_literal(s)),
            Expr::Int(n) => w.push(&n.to_string()),
            Expr::Bool(true) => w.push("TRUE"),
            Expr::Bool(false) => w.push("FALSE"),
            Expr::CountAll => w.push("COUNT(*)"),
            Expr::Binary { op, lhs, rhs } => {
                operand(w, op.wraps(lhs), lhs);
                w.push(" ");
                w.push(op.symbol());
                w.push(" ");
                operand(w, op.wraps(rhs), rhs);
            }
            Expr::IsNotNull(expr) => {
                expr.render(w);
                w.push(" IS NOT NULL");
            }
            Expr::ILike { subject, pattern } => {
                subject.render(w);
                w.push(" ILIKE ");
                pattern.render(w);
            }
            Expr::Exists(subquery) => {
                w.push("EXISTS (");
                w.depth += 1;
                subquery.render(w);
                w.depth -= 1;
                w.push(")");
            }
        }
    }
}

fn operand(w: &mut SqlWriter, parens: bool, expr: &Expr) {
    if parens {
        w.push("(");
        expr.render(w);
        w.push(")");
    } else {
        expr.render(w);
    }
}

impl Render for Source {
    fn render(&self, w: &mut SqlWriter) {
        match self {
            Source::Table { name, alias } => {
                w.ident(name.as_str());
                if let Some(alias) = alias {
                    w.push(" ");
                    w.ident(alias.as_str());
                }
            }
            Source::Unnest { array, alias } => {
                w.push("unnest(");
                array.render(w);
                w.push(") AS ");
                w.ident(alias.as_str());
            }
        }
    }
}

impl Render for SelectItem {
    fn render(&self, w: &mut SqlWriter) {
        match self {
            SelectItem::Expr { expr, alias } => {
                expr.render(w);
                if let Some(alias) = alias {
                    w.push(" AS ");
                    w.ident(alias.as_str());
                }
            }
            SelectItem::AllOf(table) => {
                w.ident(table.as_str());
                w.push(".*");
            }
        }
    }
}

impl Render for Select {
    fn render(&self, w: &mut SqlWriter) {
        w.push(if self.distinct { "SELECT DISTINCT " } else { "SELECT " });
        if self.items.is_empty() {
            w.push("*");
        } else {
            w.list(&self.items, |w, item| item.render(w));
        }

        w.clause("FROM ");
        self.source.render(w);

        for join in &self.joins {
            w.clause("INNER JOIN ");
            w.ident(join.table.as_str());
            w.push(" ");
            w.ident(join.alias.as_str());
            w.push(" ON ");
            join.on.render(w);
        }

        w.filter(&self.filter);

        if !self.order.is_empty() {
            w.clause("ORDER BY ");
            w.list(&self.order, |w, (expr, desc)| {
                expr.render(w);
                w.push(if *desc { " DESC" } else { " ASC" });
            });
        }
        if let Some(limit) = &self.limit {
            w.clause("LIMIT ");
            limit.render(w);
        }
        if let Some(offset) = &self.offset {
            w.clause("OFFSET ");
            offset.render(w);
        }
    }
}

impl Render for Insert {
    fn render(&self, w: &mut SqlWriter) {
        w.push("INSERT INTO ");
        w.ident(self.table.as_str());
        w.push(" (");
        w.list(&self.values, |w, (column, _)| w.ident(column.as_str()));
        w.push(")");

        w.clause("VALUES (");
        w.list(&self.values, |w, (_, expr)| expr.render(w));
        w.push(")");

        if let Some(target) = &self.ignore_conflicts {
            w.clause("ON CONFLICT (");
            w.columns(target);
            w.push(") DO NOTHING");
        }
        w.returning(&self.returning);
    }
}

impl Render for Update {
    fn render(&self, w: &mut SqlWriter) {
        w.push("UPDATE ");
        w.ident(self.table.as_str());
        w.clause("SET ");
        w.list(&self.set, |w, (column, expr)| {
            w.ident(column.as_str());
            w.push(" = ");
            expr.render(w);
        });
        w.filter(&self.filter);
        w.returning(&self.returning);
    }
}

impl Render for Delete {
    fn render(&self, w: &mut SqlWriter) {
        w.push("DELETE FROM ");
        w.ident(self.table.as_str());
        w.filter(&self.filter);
    }
}
