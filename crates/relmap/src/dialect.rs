//! SQL dialects: identifier quoting and placeholder rendering.
//!
//! Dialects are stateless. Placeholder numbering is owned by the
//! [`Expander`](crate::expr::Expander) created for each expansion, so a
//! dialect value can be shared freely across threads and statements.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::OrmError;

/// Identifier quoting and placeholder style of one SQL dialect.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Driver name this dialect is registered under.
    fn name(&self) -> &'static str;

    /// Write `ident` quoted, doubling any embedded quote character.
    fn quote_identifier(&self, ident: &str, out: &mut String);

    /// Write the placeholder for the `index`-th argument (1-based).
    fn placeholder(&self, index: usize, out: &mut String);
}

fn quote_with(quote: char, ident: &str, out: &mut String) {
    out.push(quote);
    for c in ident.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
}

/// Back quoted identifiers, `?` placeholders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str, out: &mut String) {
        quote_with('`', ident, out);
    }

    fn placeholder(&self, _index: usize, out: &mut String) {
        out.push('?');
    }
}

/// Double quoted identifiers, numbered `$n` placeholders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str, out: &mut String) {
        quote_with('"', ident, out);
    }

    fn placeholder(&self, index: usize, out: &mut String) {
        let _ = write!(out, "${index}");
    }
}

/// Double quoted identifiers, `?` placeholders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str, out: &mut String) {
        quote_with('"', ident, out);
    }

    fn placeholder(&self, _index: usize, out: &mut String) {
        out.push('?');
    }
}

/// Selects one of the built-in dialects, e.g. from a config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    Mysql,
    Postgres,
    Sqlite,
}

impl DialectKind {
    pub fn dialect(self) -> &'static dyn Dialect {
        match self {
            Self::Mysql => &MySql,
            Self::Postgres => &Postgres,
            Self::Sqlite => &Sqlite,
        }
    }
}

impl FromStr for DialectKind {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mysql" => Ok(Self::Mysql),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            other => Err(OrmError::Config(format!("unknown dialect '{other}'"))),
        }
    }
}

/// Look up a built-in dialect by driver name.
pub fn dialect_for(driver: &str) -> Option<&'static dyn Dialect> {
    driver.parse::<DialectKind>().ok().map(DialectKind::dialect)
}
