//! DELETE statement builder.

use crate::condition::Condition;
use crate::error::{OrmError, OrmResult};
use crate::expr::{Arg, Expander, Expression};
use crate::query::{Term, write_limit, write_predicates, write_terms};

/// DELETE; only the table is required.
#[derive(Debug, Clone)]
pub struct Delete {
    table: String,
    filters: Vec<Condition>,
    order_by: Vec<Term>,
    limit: u64,
}

impl Delete {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: 0,
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.filters.push(condition);
        self
    }

    pub fn order_by(mut self, term: impl Into<Term>) -> Self {
        self.order_by.push(term.into());
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = n;
        self
    }
}

impl Expression for Delete {
    fn write_to(&self, out: &mut Expander<'_>) -> OrmResult<()> {
        if self.table.is_empty() {
            return Err(OrmError::statement("delete", "empty table"));
        }

        out.push_sql("DELETE FROM ");
        out.push_identifier(&self.table);

        write_predicates(out, " WHERE ", &self.filters)?;

        if !self.order_by.is_empty() {
            out.push_sql(" ORDER BY ");
            write_terms(out, &self.order_by)?;
        }

        write_limit(out, " LIMIT ", self.limit);
        Ok(())
    }
}

impl From<Delete> for Arg {
    fn from(delete: Delete) -> Self {
        Arg::expr(delete)
    }
}
