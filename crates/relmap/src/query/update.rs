//! UPDATE statement builder.

use chrono::{DateTime, Utc};

use crate::condition::Condition;
use crate::error::{OrmError, OrmResult};
use crate::expr::{Arg, Expander, Expression};
use crate::query::{Term, write_limit, write_predicates, write_terms};

/// UPDATE with assignments, predicates, ordering and limit.
#[derive(Debug, Clone)]
pub struct Update {
    /// Target table
    table: String,
    /// SET assignments; values or computed expressions
    sets: Vec<(String, Arg)>,
    /// WHERE predicates, joined with AND
    filters: Vec<Condition>,
    /// ORDER BY terms
    order_by: Vec<Term>,
    /// LIMIT, rendered when greater than zero
    limit: u64,
}

impl Update {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            sets: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: 0,
        }
    }

    /// `column = value`, where value may be a nested expression.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.sets.push((column.into(), value.into()));
        self
    }

    /// Set `column` to the current time truncated to whole seconds.
    pub fn auto_now(self, column: impl Into<String>) -> Self {
        let now = now_seconds();
        self.set(column, now)
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

    pub fn table(&self) -> &str {
        &self.table
    }
}

/// Current UTC time without sub-second precision.
pub(crate) fn now_seconds() -> DateTime<Utc> {
    whole_seconds(Utc::now())
}

pub(crate) fn whole_seconds(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or(time)
}

impl Expression for Update {
    fn write_to(&self, out: &mut Expander<'_>) -> OrmResult<()> {
        if self.table.is_empty() {
            return Err(OrmError::statement("update", "empty table"));
        }
        if self.sets.is_empty() {
            return Err(OrmError::statement("update", "empty set"));
        }

        out.push_sql("UPDATE ");
        out.push_identifier(&self.table);
        out.push_sql(" SET ");
        for (i, (column, value)) in self.sets.iter().enumerate() {
            if i > 0 {
                out.push_char(',');
            }
            out.push_identifier(column);
            out.push_char('=');
            out.push_arg(value)?;
        }

        write_predicates(out, " WHERE ", &self.filters)?;

        if !self.order_by.is_empty() {
            out.push_sql(" ORDER BY ");
            write_terms(out, &self.order_by)?;
        }

        write_limit(out, " LIMIT ", self.limit);
        Ok(())
    }
}

impl From<Update> for Arg {
    fn from(update: Update) -> Self {
        Arg::expr(update)
    }
}
