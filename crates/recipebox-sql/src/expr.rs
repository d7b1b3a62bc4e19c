use crate::query::Select;
use crate::{ColumnName, ParamName, TableName};

/// A scalar or boolean SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Named placeholder, numbered at render time.
    Param(ParamName),
    Column(ColumnRef),
    Text(String),
    Int(i64),
    Bool(bool),
    /// `COUNT(*)`
    CountAll,
    Binary {
        op: Op,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    IsNotNull(Box<Expr>),
    ILike {
        subject: Box<Expr>,
        pattern: Box<Expr>,
    },
    Exists(Box<Select>),
}

/// `column` or `table.column`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub table: Option<TableName>,
    pub name: ColumnName,
}

/// Binary operators we emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    And,
    Or,
    Add,
}

impl Op {
    pub fn symbol(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::And => "AND",
            Op::Or => "OR",
            Op::Add => "+",
        }
    }

    /// Postgres binding strength; higher binds tighter.
    fn strength(self) -> u8 {
        match self {
            Op::Or => 1,
            Op::And => 2,
            Op::Eq => 3,
            Op::Add => 4,
        }
    }

    /// Whether `child`, as an operand of `self`, needs parentheses to keep
    /// its grouping.
    pub(crate) fn wraps(self, child: &Expr) -> bool {
        match child {
            Expr::Binary { op, .. } => {
                let (outer, inner) = (self.strength(), op.strength());
                // `=` does not chain, so an `=` operand always keeps its parens.
                inner < outer || (inner == outer && (*op != self || self == Op::Eq))
            }
            // Postfix and ILIKE forms bind looser than `=` and `+`.
            Expr::IsNotNull(_) | Expr::ILike { .. } => self.strength() > Op::And.strength(),
            _ => false,
        }
    }
}

impl Expr {
    pub fn param(name: impl Into<ParamName>) -> Self {
        Expr::Param(name.into())
    }

    pub fn column(name: impl Into<ColumnName>) -> Self {
        Expr::Column(ColumnRef {
            table: None,
            name: name.into(),
        })
    }

    /// `table.column`
    pub fn qualified(table: impl Into<TableName>, name: impl Into<ColumnName>) -> Self {
        Expr::Column(ColumnRef {
            table: Some(table.into()),
            name: name.into(),
        })
    }

    pub fn text(value: impl Into<String>) -> Self {
        Expr::Text(value.into())
    }

    pub fn int(value: i64) -> Self {
        Expr::Int(value)
    }

    pub fn bool(value: bool) -> Self {
        Expr::Bool(value)
    }

    fn binary(self, op: Op, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        }
    }

    pub fn eq(self, rhs: Expr) -> Self {
        self.binary(Op::Eq, rhs)
    }

    pub fn and(self, rhs: Expr) -> Self {
        self.binary(Op::And, rhs)
    }

    pub fn or(self, rhs: Expr) -> Self {
        self.binary(Op::Or, rhs)
    }

    pub fn add(self, rhs: Expr) -> Self {
        self.binary(Op::Add, rhs)
    }

    pub fn is_not_null(self) -> Self {
        Expr::IsNotNull(Box::new(self))
    }

    pub fn ilike(self, pattern: Expr) -> Self {
        Expr::ILike {
            subject: Box::new(self),
            pattern: Box::new(pattern),
        }
    }

    pub fn exists(subquery: Select) -> Self {
        Expr::Exists(Box::new(subquery))
    }

    /// Conjunction of `exprs`; `None` when there are none.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs.into_iter().reduce(Expr::and)
    }
}
