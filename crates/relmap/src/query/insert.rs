//! INSERT statement builder.

use crate::error::{OrmError, OrmResult};
use crate::expr::{Arg, Expander, Expression};

/// INSERT with one or more value rows.
#[derive(Debug, Clone)]
pub struct Insert {
    /// Target table
    table: String,
    /// Column names
    columns: Vec<String>,
    /// One entry per VALUES tuple
    rows: Vec<Vec<Arg>>,
}

impl Insert {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Append columns.
    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Append one VALUES row. Use [`args!`](crate::args) for mixed types.
    pub fn values<A: Into<Arg>>(mut self, row: impl IntoIterator<Item = A>) -> Self {
        self.rows.push(row.into_iter().map(Into::into).collect());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl Expression for Insert {
    fn write_to(&self, out: &mut Expander<'_>) -> OrmResult<()> {
        if self.table.is_empty() {
            return Err(OrmError::statement("insert", "empty table"));
        }
        if self.columns.is_empty() {
            return Err(OrmError::statement("insert", "no columns"));
        }
        if self.rows.is_empty() {
            return Err(OrmError::statement("insert", "no values"));
        }
        if let Some((i, row)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != self.columns.len())
        {
            return Err(OrmError::statement(
                "insert",
                format!(
                    "row {} has {} values for {} columns",
                    i + 1,
                    row.len(),
                    self.columns.len()
                ),
            ));
        }

        out.push_sql("INSERT INTO ");
        out.push_identifier(&self.table);
        out.push_sql(" (");
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                out.push_char(',');
            }
            out.push_identifier(column);
        }
        out.push_sql(") VALUES ");
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                out.push_char(',');
            }
            out.push_char('(');
            for (j, arg) in row.iter().enumerate() {
                if j > 0 {
                    out.push_char(',');
                }
                out.push_arg(arg)?;
            }
            out.push_char(')');
        }
        Ok(())
    }
}

impl From<Insert> for Arg {
    fn from(insert: Insert) -> Self {
        Arg::expr(insert)
    }
}
