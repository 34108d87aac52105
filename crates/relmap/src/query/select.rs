//! SELECT statement builder.

use crate::condition::{Condition, and};
use crate::error::{OrmError, OrmResult};
use crate::expr::{Arg, Expander, Expression};
use crate::query::{Querier, Source, Term, write_limit, write_predicates, write_terms};

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Full => "FULL JOIN",
        }
    }
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    target: Source,
    using: Vec<String>,
    on: Vec<Condition>,
}

/// SELECT with joins, grouping, ordering and paging.
#[derive(Debug, Clone, Default)]
pub struct Select {
    /// Alias used when this select is a subquery
    alias: Option<String>,
    /// Select list; empty renders `*`
    columns: Vec<Term>,
    /// FROM sources
    from: Vec<Source>,
    /// JOIN clauses in call order
    joins: Vec<Join>,
    /// WHERE predicates, joined with AND
    filters: Vec<Condition>,
    /// GROUP BY terms
    group_by: Vec<Term>,
    /// HAVING predicates, joined with AND
    having: Vec<Condition>,
    /// ORDER BY terms
    order_by: Vec<Term>,
    /// LIMIT, rendered when greater than zero
    limit: u64,
    /// OFFSET, rendered when greater than zero
    offset: u64,
    /// Build error
    build_error: Option<OrmError>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Select list ====================

    /// Append one select list entry.
    pub fn column(mut self, term: impl Into<Term>) -> Self {
        self.columns.push(term.into());
        self
    }

    /// Append select list entries.
    pub fn columns<T: Into<Term>>(mut self, terms: impl IntoIterator<Item = T>) -> Self {
        self.columns.extend(terms.into_iter().map(Into::into));
        self
    }

    // ==================== FROM / JOIN ====================

    /// Append a FROM source: a table name or an aliased subquery.
    pub fn from(mut self, source: impl Into<Source>) -> Self {
        self.from.push(source.into());
        self
    }

    /// Add a join without a constraint; follow with [`using`](Self::using)
    /// or [`on`](Self::on).
    pub fn join(mut self, kind: JoinKind, target: impl Into<Source>) -> Self {
        self.joins.push(Join {
            kind,
            target: target.into(),
            using: Vec::new(),
            on: Vec::new(),
        });
        self
    }

    pub fn inner_join(self, target: impl Into<Source>) -> Self {
        self.join(JoinKind::Inner, target)
    }

    pub fn left_join(self, target: impl Into<Source>) -> Self {
        self.join(JoinKind::Left, target)
    }

    pub fn right_join(self, target: impl Into<Source>) -> Self {
        self.join(JoinKind::Right, target)
    }

    pub fn full_join(self, target: impl Into<Source>) -> Self {
        self.join(JoinKind::Full, target)
    }

    /// `USING (..)` columns for the last join.
    pub fn using<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        match self.joins.last_mut() {
            Some(join) => join.using.extend(columns.into_iter().map(Into::into)),
            None => self.set_error("using without a join"),
        }
        self
    }

    /// `ON` condition for the last join; repeated calls are joined with AND.
    pub fn on(mut self, condition: Condition) -> Self {
        match self.joins.last_mut() {
            Some(join) => join.on.push(condition),
            None => self.set_error("on without a join"),
        }
        self
    }

    // ==================== WHERE / GROUP BY / HAVING ====================

    /// Add a WHERE predicate.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filters.push(condition);
        self
    }

    pub fn group_by(mut self, term: impl Into<Term>) -> Self {
        self.group_by.push(term.into());
        self
    }

    /// Add a HAVING predicate.
    pub fn having(mut self, condition: Condition) -> Self {
        self.having.push(condition);
        self
    }

    // ==================== ORDER / paging ====================

    pub fn order_by(mut self, term: impl Into<Term>) -> Self {
        self.order_by.push(term.into());
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = n;
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = n;
        self
    }

    /// Name this select for use as a subquery source.
    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn set_error(&mut self, message: &str) {
        if self.build_error.is_none() {
            self.build_error = Some(OrmError::statement("select", message));
        }
    }
}

fn write_source(out: &mut Expander<'_>, source: &Source) -> OrmResult<()> {
    match source {
        Source::Table(table) => out.push_identifier(table),
        Source::Query(query) => {
            let alias = query
                .alias()
                .ok_or_else(|| OrmError::statement("select", "subquery needs an alias"))?;
            out.push_char('(');
            out.push_expression(query.as_ref())?;
            out.push_sql(") AS ");
            out.push_identifier(alias);
        }
    }
    Ok(())
}

impl Expression for Select {
    fn error(&self) -> Option<&OrmError> {
        self.build_error.as_ref()
    }

    fn write_to(&self, out: &mut Expander<'_>) -> OrmResult<()> {
        if let Some(err) = &self.build_error {
            return Err(err.clone());
        }
        if self.from.is_empty() {
            return Err(OrmError::statement("select", "empty from"));
        }

        out.push_sql("SELECT ");
        if self.columns.is_empty() {
            out.push_char('*');
        } else {
            write_terms(out, &self.columns)?;
        }

        out.push_sql(" FROM ");
        for (i, source) in self.from.iter().enumerate() {
            if i > 0 {
                out.push_char(',');
            }
            write_source(out, source)?;
        }

        for join in &self.joins {
            out.push_char(' ');
            out.push_sql(join.kind.as_sql());
            out.push_char(' ');
            write_source(out, &join.target)?;

            let on: Vec<Condition> = join.on.iter().filter(|c| !c.is_empty()).cloned().collect();
            match (join.using.is_empty(), on.is_empty()) {
                (false, false) => {
                    return Err(OrmError::statement(
                        "select",
                        "join using columns or on condition, but not both",
                    ));
                }
                (false, true) => {
                    out.push_sql(" USING (");
                    for (i, column) in join.using.iter().enumerate() {
                        if i > 0 {
                            out.push_char(',');
                        }
                        out.push_identifier(column);
                    }
                    out.push_char(')');
                }
                (true, false) => {
                    out.push_sql(" ON ");
                    out.push_expression(&and(on))?;
                }
                (true, true) => {}
            }
        }

        write_predicates(out, " WHERE ", &self.filters)?;

        if !self.group_by.is_empty() {
            out.push_sql(" GROUP BY ");
            write_terms(out, &self.group_by)?;
        }

        write_predicates(out, " HAVING ", &self.having)?;

        if !self.order_by.is_empty() {
            out.push_sql(" ORDER BY ");
            write_terms(out, &self.order_by)?;
        }

        write_limit(out, " LIMIT ", self.limit);
        write_limit(out, " OFFSET ", self.offset);
        Ok(())
    }
}

impl Querier for Select {
    fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

impl From<Select> for Arg {
    fn from(select: Select) -> Self {
        Arg::expr(select)
    }
}
