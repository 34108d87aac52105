//! Expression templates.
//!
//! A template is SQL text with two kinds of slots:
//!
//! - `` `name` `` or `` `table.column` ``: an identifier quoted by the dialect
//!   at expansion time. Outside an identifier a doubled back quote is a
//!   literal back quote. Inside one, a doubled back quote embeds a back quote
//!   and `..` embeds a dot instead of splitting qualifier and name.
//! - `?`: the next argument. `??` is a literal question mark.
//!
//! Each argument is either a plain [`Value`], bound as a placeholder, or a
//! nested [`Expression`] whose SQL replaces the marker and whose arguments are
//! spliced into the parent's list in order.
//!
//! ```ignore
//! use relmap::{expr, MySql, Expression};
//!
//! let e = expr!("COUNT(DISTINCT `t3.c3`) > ?", 2);
//! let built = e.expand(&MySql)?;
//! assert_eq!(built.sql, "COUNT(DISTINCT `t3`.`c3`) > ?");
//! ```

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult, TemplateErrorKind};
use crate::value::Value;

/// Anything that expands into SQL text plus arguments.
pub trait Expression: fmt::Debug + Send + Sync {
    /// The first construction error, returned again by every expansion.
    fn error(&self) -> Option<&OrmError> {
        None
    }

    /// Append this expression's SQL and arguments to `out`.
    fn write_to(&self, out: &mut Expander<'_>) -> OrmResult<()>;

    /// Expand against `dialect` with fresh placeholder numbering.
    fn expand(&self, dialect: &dyn Dialect) -> OrmResult<BuiltQuery> {
        if let Some(err) = self.error() {
            return Err(err.clone());
        }
        let mut out = Expander::new(dialect);
        self.write_to(&mut out)?;
        let built = out.finish();
        tracing::trace!(
            target: "relmap::sql",
            dialect = dialect.name(),
            sql = %built.sql,
            args = built.args.len(),
            "expanded"
        );
        Ok(built)
    }
}

/// Final SQL text with its positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltQuery {
    pub sql: String,
    pub args: Vec<Value>,
}

impl BuiltQuery {
    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.args)
    }
}

// ==================== Expander ====================

/// Output buffer for one expansion.
///
/// Placeholder indexes come from the number of arguments pushed so far, so
/// numbering starts at 1 for every new expander and continues through
/// nested expressions.
pub struct Expander<'d> {
    dialect: &'d dyn Dialect,
    sql: String,
    args: Vec<Value>,
}

impl<'d> Expander<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            args: Vec::new(),
        }
    }

    pub fn dialect(&self) -> &'d dyn Dialect {
        self.dialect
    }

    pub fn push_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    pub fn push_char(&mut self, c: char) {
        self.sql.push(c);
    }

    /// Quote a single identifier.
    pub fn push_identifier(&mut self, ident: &str) {
        self.dialect.quote_identifier(ident, &mut self.sql);
    }

    /// Quote each part of a qualified identifier and join them with dots.
    pub fn push_path(&mut self, parts: &[String]) {
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.sql.push('.');
            }
            self.dialect.quote_identifier(part, &mut self.sql);
        }
    }

    /// Bind one argument and write its placeholder.
    pub fn push_value(&mut self, value: Value) {
        self.args.push(value);
        self.dialect.placeholder(self.args.len(), &mut self.sql);
    }

    /// Splice a nested expression, surfacing its stored error first.
    pub fn push_expression(&mut self, expr: &dyn Expression) -> OrmResult<()> {
        if let Some(err) = expr.error() {
            return Err(err.clone());
        }
        expr.write_to(self)
    }

    pub fn push_arg(&mut self, arg: &Arg) -> OrmResult<()> {
        match arg {
            Arg::Value(value) => {
                self.push_value(value.clone());
                Ok(())
            }
            Arg::Expr(expr) => self.push_expression(expr.as_ref()),
        }
    }

    pub fn finish(self) -> BuiltQuery {
        BuiltQuery {
            sql: self.sql,
            args: self.args,
        }
    }
}

// ==================== Arguments ====================

/// One template argument.
#[derive(Debug, Clone)]
pub enum Arg {
    Value(Value),
    Expr(Arc<dyn Expression>),
}

impl Arg {
    /// Wrap any expression as a nested argument.
    pub fn expr(expr: impl Expression + 'static) -> Self {
        Self::Expr(Arc::new(expr))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Value(Value::Null))
    }

    pub(crate) fn error(&self) -> Option<&OrmError> {
        match self {
            Self::Value(_) => None,
            Self::Expr(expr) => expr.error(),
        }
    }
}

macro_rules! impl_arg_from_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Arg {
                fn from(v: $t) -> Self {
                    Arg::Value(Value::from(v))
                }
            }
        )*
    };
}

impl_arg_from_value!(
    Value,
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    &str,
    Vec<u8>,
    &[u8],
    DateTime<Utc>,
);

impl<T: Into<Value>> From<Option<T>> for Arg {
    fn from(v: Option<T>) -> Self {
        Arg::Value(Value::from(v))
    }
}

impl From<Expr> for Arg {
    fn from(expr: Expr) -> Self {
        Arg::expr(expr)
    }
}

impl From<Arc<dyn Expression>> for Arg {
    fn from(expr: Arc<dyn Expression>) -> Self {
        Arg::Expr(expr)
    }
}

// ==================== Templates ====================

#[derive(Debug, Clone)]
enum Segment {
    Text(String),
    Ident(Vec<String>),
    Arg(Arg),
}

enum Piece {
    Text(String),
    Ident(Vec<String>),
    Marker,
}

/// A compiled, dialect-independent template.
///
/// Construction never fails; a malformed template (or a malformed nested
/// argument) is stored and reported by [`Expression::error`] and every
/// expansion.
#[derive(Debug, Clone)]
pub struct Expr {
    segments: Vec<Segment>,
    error: Option<OrmError>,
}

impl Expr {
    /// Compile `template` with its positional arguments.
    pub fn new(template: impl Into<String>, args: impl IntoIterator<Item = Arg>) -> Self {
        let template = template.into();
        let args: Vec<Arg> = args.into_iter().collect();
        match parse(&template).and_then(|pieces| bind(pieces, args)) {
            Ok(segments) => {
                let error = segments.iter().find_map(|s| match s {
                    Segment::Arg(arg) => arg.error().cloned(),
                    _ => None,
                });
                Self { segments, error }
            }
            Err(kind) => Self {
                segments: Vec::new(),
                error: Some(OrmError::template(template, kind)),
            },
        }
    }

    /// Compile a template that takes no arguments.
    pub fn text(template: impl Into<String>) -> Self {
        Self::new(template, Vec::<Arg>::new())
    }
}

impl Expression for Expr {
    fn error(&self) -> Option<&OrmError> {
        self.error.as_ref()
    }

    fn write_to(&self, out: &mut Expander<'_>) -> OrmResult<()> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_sql(text),
                Segment::Ident(parts) => out.push_path(parts),
                Segment::Arg(arg) => out.push_arg(arg)?,
            }
        }
        Ok(())
    }
}

fn flush(text: &mut String, pieces: &mut Vec<Piece>) {
    if !text.is_empty() {
        pieces.push(Piece::Text(std::mem::take(text)));
    }
}

fn parse(template: &str) -> Result<Vec<Piece>, TemplateErrorKind> {
    if template.is_empty() {
        return Err(TemplateErrorKind::Empty);
    }

    let mut pieces = Vec::new();
    let mut text = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '`' if chars.peek() == Some(&'`') => {
                chars.next();
                text.push('`');
            }
            '`' => {
                flush(&mut text, &mut pieces);
                pieces.push(Piece::Ident(parse_identifier(&mut chars)?));
            }
            '?' if chars.peek() == Some(&'?') => {
                chars.next();
                text.push('?');
            }
            '?' => {
                flush(&mut text, &mut pieces);
                pieces.push(Piece::Marker);
            }
            c => text.push(c),
        }
    }
    flush(&mut text, &mut pieces);

    Ok(pieces)
}

/// Read an identifier after its opening back quote, up to the closing one.
fn parse_identifier(chars: &mut Peekable<Chars<'_>>) -> Result<Vec<String>, TemplateErrorKind> {
    let mut parts = Vec::new();
    let mut part = String::new();

    loop {
        match chars.next() {
            None => return Err(TemplateErrorKind::UnmatchedQuote),
            Some('`') if chars.peek() == Some(&'`') => {
                chars.next();
                part.push('`');
            }
            Some('`') => break,
            Some('.') if chars.peek() == Some(&'.') => {
                chars.next();
                part.push('.');
            }
            Some('.') => parts.push(std::mem::take(&mut part)),
            Some(c) => part.push(c),
        }
    }

    // a trailing separator adds no empty part
    if !part.is_empty() || parts.is_empty() {
        parts.push(part);
    }
    Ok(parts)
}

fn bind(pieces: Vec<Piece>, args: Vec<Arg>) -> Result<Vec<Segment>, TemplateErrorKind> {
    let markers = pieces.iter().filter(|p| matches!(p, Piece::Marker)).count();
    let arguments = args.len();
    if markers > arguments {
        return Err(TemplateErrorKind::NotEnoughArguments { markers, arguments });
    }
    if markers < arguments {
        return Err(TemplateErrorKind::TooManyArguments { markers, arguments });
    }

    let mut args = args.into_iter();
    let mut segments = Vec::with_capacity(pieces.len());
    for piece in pieces {
        match piece {
            Piece::Text(text) => segments.push(Segment::Text(text)),
            Piece::Ident(parts) => segments.push(Segment::Ident(parts)),
            Piece::Marker => {
                if let Some(arg) = args.next() {
                    segments.push(Segment::Arg(arg));
                }
            }
        }
    }
    Ok(segments)
}

// ==================== Helpers ====================

/// Wrap `name` in back quotes for use inside a template.
pub fn back_quote(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Escape `\`, `_` and `%` for a LIKE pattern.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '_' | '%') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `n` comma separated markers, e.g. `?,?,?`.
pub fn repeat_marker(n: usize) -> String {
    vec!["?"; n].join(",")
}
