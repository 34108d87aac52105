//! Statement builders.
//!
//! Each builder accumulates clauses through consuming `mut self` methods and
//! defers every structural check to expansion:
//!
//! ```ignore
//! use relmap::query::{select, desc};
//! use relmap::condition::{eq, in_list};
//! use relmap::{Expression, Postgres};
//!
//! let built = select(["t1.c1", "c2"])
//!     .from("t1")
//!     .filter(eq("t1.c1", 1))
//!     .filter(in_list("c2", ["a", "b"]))
//!     .order_by(desc("c2"))
//!     .limit(10)
//!     .expand(&Postgres)?;
//! ```

use std::sync::Arc;

use crate::condition::Condition;
use crate::error::OrmResult;
use crate::expr::{Expander, Expr, Expression, back_quote};

mod delete;
mod insert;
mod select;
mod update;

#[cfg(test)]
mod tests;

pub use delete::Delete;
pub use insert::Insert;
pub use select::{JoinKind, Select};
pub use update::Update;

pub(crate) use update::whole_seconds;

/// Start an INSERT into `table`.
pub fn insert(table: impl Into<String>) -> Insert {
    Insert::new(table)
}

/// Start a SELECT of `columns`; no columns selects `*`.
pub fn select<T: Into<Term>>(columns: impl IntoIterator<Item = T>) -> Select {
    Select::new().columns(columns)
}

/// Start an UPDATE of `table`.
pub fn update(table: impl Into<String>) -> Update {
    Update::new(table)
}

/// Start a DELETE from `table`.
pub fn delete(table: impl Into<String>) -> Delete {
    Delete::new(table)
}

/// `` `k` ASC ``
pub fn asc(column: &str) -> Expr {
    Expr::text(format!("{} ASC", back_quote(column)))
}

/// `` `k` DESC ``
pub fn desc(column: &str) -> Expr {
    Expr::text(format!("{} DESC", back_quote(column)))
}

/// An entry of a select list, GROUP BY or ORDER BY.
///
/// Strings are column names (`t.c` splits into qualifier and name, `t..c`
/// keeps the dot); anything else is an expression spliced as is.
#[derive(Debug, Clone)]
pub struct Term(Arc<dyn Expression>);

impl Term {
    pub fn column(name: &str) -> Self {
        Self(Arc::new(Expr::text(back_quote(name))))
    }

    pub fn expr(expr: impl Expression + 'static) -> Self {
        Self(Arc::new(expr))
    }
}

impl From<&str> for Term {
    fn from(name: &str) -> Self {
        Self::column(name)
    }
}

impl From<String> for Term {
    fn from(name: String) -> Self {
        Self::column(&name)
    }
}

impl From<&String> for Term {
    fn from(name: &String) -> Self {
        Self::column(name)
    }
}

impl From<Expr> for Term {
    fn from(expr: Expr) -> Self {
        Self::expr(expr)
    }
}

/// A statement that can stand in a FROM or JOIN as an aliased subquery.
pub trait Querier: Expression {
    fn alias(&self) -> Option<&str>;
}

/// FROM or JOIN target: a table name or an aliased subquery.
#[derive(Debug, Clone)]
pub enum Source {
    Table(String),
    Query(Arc<dyn Querier>),
}

impl From<&str> for Source {
    fn from(table: &str) -> Self {
        Self::Table(table.to_string())
    }
}

impl From<String> for Source {
    fn from(table: String) -> Self {
        Self::Table(table)
    }
}

impl From<Select> for Source {
    fn from(query: Select) -> Self {
        Self::Query(Arc::new(query))
    }
}

// ==================== Shared rendering ====================

pub(crate) fn write_terms(out: &mut Expander<'_>, terms: &[Term]) -> OrmResult<()> {
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            out.push_char(',');
        }
        out.push_expression(term.0.as_ref())?;
    }
    Ok(())
}

/// Write `keyword` then every non-empty condition wrapped in parentheses
/// and joined with AND. Nothing is written when all conditions are empty.
pub(crate) fn write_predicates(
    out: &mut Expander<'_>,
    keyword: &str,
    conditions: &[Condition],
) -> OrmResult<()> {
    let mut first = true;
    for condition in conditions.iter().filter(|c| !c.is_empty()) {
        if first {
            out.push_sql(keyword);
            first = false;
        } else {
            out.push_sql(" AND ");
        }
        out.push_char('(');
        out.push_expression(condition)?;
        out.push_char(')');
    }
    Ok(())
}

pub(crate) fn write_limit(out: &mut Expander<'_>, keyword: &str, n: u64) {
    if n > 0 {
        out.push_sql(keyword);
        out.push_sql(&n.to_string());
    }
}
