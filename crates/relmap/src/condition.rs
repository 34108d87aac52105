//! Logical conditions over expressions.
//!
//! A [`Condition`] is either a leaf expression, optionally negated, or a flat
//! AND/OR group of child conditions. Combining with the operator a group
//! already uses extends that group rather than nesting a new one.
//!
//! ```ignore
//! use relmap::condition::{eq, gt, is_null};
//!
//! let c = eq("status", "active").and(gt("age", 18)).or(is_null("deleted_at"));
//! ```

use crate::error::{OrmError, OrmResult};
use crate::expr::{Arg, Expander, Expr, Expression, back_quote, escape_like, repeat_marker};

/// A leaf expression or an AND/OR group.
#[derive(Debug, Clone)]
pub enum Condition {
    Leaf {
        negated: bool,
        expr: Expr,
    },
    Group {
        and: bool,
        /// First child error, captured when the group was built
        error: Option<OrmError>,
        children: Vec<Condition>,
    },
}

impl Condition {
    /// Combine with AND, extending this condition if it is already an AND group.
    pub fn and(self, other: Condition) -> Condition {
        self.combine(true, other)
    }

    /// Combine with OR, extending this condition if it is already an OR group.
    pub fn or(self, other: Condition) -> Condition {
        self.combine(false, other)
    }

    /// Negate the condition.
    ///
    /// A leaf toggles its flag. A group negates each child and flips its
    /// operator, so `(a AND b).not()` renders `(NOT (a)) OR (NOT (b))`.
    pub fn not(self) -> Condition {
        match self {
            Self::Leaf { negated, expr } => Self::Leaf {
                negated: !negated,
                expr,
            },
            Self::Group {
                and,
                error,
                children,
            } => Self::Group {
                and: !and,
                error,
                children: children.into_iter().map(Condition::not).collect(),
            },
        }
    }

    /// A group with no children renders nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Group { children, .. } if children.is_empty())
    }

    fn combine(self, and: bool, other: Condition) -> Condition {
        match self {
            Self::Group {
                and: current,
                error,
                mut children,
            } if current == and => {
                let error = error.or_else(|| other.error().cloned());
                children.push(other);
                Self::Group {
                    and,
                    error,
                    children,
                }
            }
            this => group(and, vec![this, other]),
        }
    }
}

fn group(and: bool, mut children: Vec<Condition>) -> Condition {
    if children.len() == 1 {
        if let Some(only) = children.pop() {
            return only;
        }
    }
    let error = children.iter().find_map(|c| c.error().cloned());
    Condition::Group {
        and,
        error,
        children,
    }
}

/// AND of `conditions`; a single condition is returned unchanged.
pub fn and(conditions: impl IntoIterator<Item = Condition>) -> Condition {
    group(true, conditions.into_iter().collect())
}

/// OR of `conditions`; a single condition is returned unchanged.
pub fn or(conditions: impl IntoIterator<Item = Condition>) -> Condition {
    group(false, conditions.into_iter().collect())
}

impl From<Expr> for Condition {
    fn from(expr: Expr) -> Self {
        Self::Leaf {
            negated: false,
            expr,
        }
    }
}

impl From<Condition> for Arg {
    fn from(cond: Condition) -> Self {
        Arg::expr(cond)
    }
}

impl Expression for Condition {
    fn error(&self) -> Option<&OrmError> {
        match self {
            Self::Leaf { expr, .. } => expr.error(),
            Self::Group { error, .. } => error.as_ref(),
        }
    }

    fn write_to(&self, out: &mut Expander<'_>) -> OrmResult<()> {
        match self {
            Self::Leaf { negated, expr } => {
                if *negated {
                    out.push_sql("NOT (");
                    out.push_expression(expr)?;
                    out.push_char(')');
                } else {
                    out.push_expression(expr)?;
                }
            }
            Self::Group {
                and,
                error,
                children,
            } => {
                if let Some(err) = error {
                    return Err(err.clone());
                }
                let joiner = if *and { " AND " } else { " OR " };
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        out.push_sql(joiner);
                    }
                    out.push_char('(');
                    out.push_expression(child)?;
                    out.push_char(')');
                }
            }
        }
        Ok(())
    }
}

// ==================== Helpers ====================

fn leaf(template: String, args: Vec<Arg>) -> Condition {
    Condition::from(Expr::new(template, args))
}

/// `` `k`=? ``, or `` `k` IS NULL `` when the value is null.
pub fn eq(column: &str, value: impl Into<Arg>) -> Condition {
    let value = value.into();
    if value.is_null() {
        return is_null(column);
    }
    leaf(format!("{}=?", back_quote(column)), vec![value])
}

/// `` `k`<? ``
pub fn lt(column: &str, value: impl Into<Arg>) -> Condition {
    leaf(format!("{}<?", back_quote(column)), vec![value.into()])
}

/// `` `k`<=? ``
pub fn le(column: &str, value: impl Into<Arg>) -> Condition {
    leaf(format!("{}<=?", back_quote(column)), vec![value.into()])
}

/// `` `k`>? ``
pub fn gt(column: &str, value: impl Into<Arg>) -> Condition {
    leaf(format!("{}>?", back_quote(column)), vec![value.into()])
}

/// `` `k`>=? ``
pub fn ge(column: &str, value: impl Into<Arg>) -> Condition {
    leaf(format!("{}>=?", back_quote(column)), vec![value.into()])
}

/// `` `k` IN (?,...) ``
pub fn in_list<A: Into<Arg>>(column: &str, values: impl IntoIterator<Item = A>) -> Condition {
    let values: Vec<Arg> = values.into_iter().map(Into::into).collect();
    leaf(
        format!("{} IN ({})", back_quote(column), repeat_marker(values.len())),
        values,
    )
}

/// `` `k` IN ? `` with a subquery argument
pub fn in_subquery(column: &str, query: impl Into<Arg>) -> Condition {
    leaf(format!("{} IN ?", back_quote(column)), vec![query.into()])
}

/// `` `k` BETWEEN ? AND ? ``
pub fn between(column: &str, start: impl Into<Arg>, end: impl Into<Arg>) -> Condition {
    leaf(
        format!("{} BETWEEN ? AND ?", back_quote(column)),
        vec![start.into(), end.into()],
    )
}

/// `` `k` LIKE ? ``
pub fn like(column: &str, pattern: &str) -> Condition {
    leaf(format!("{} LIKE ?", back_quote(column)), vec![pattern.into()])
}

/// `` `k` LIKE ? `` matching `value` anywhere
pub fn contains(column: &str, value: &str) -> Condition {
    like(column, &format!("%{}%", escape_like(value)))
}

/// `` `k` LIKE ? `` matching `value` as a prefix
pub fn has_prefix(column: &str, value: &str) -> Condition {
    like(column, &format!("{}%", escape_like(value)))
}

/// `` `k` LIKE ? `` matching `value` as a suffix
pub fn has_suffix(column: &str, value: &str) -> Condition {
    like(column, &format!("%{}", escape_like(value)))
}

/// `` `k` IS NULL ``
pub fn is_null(column: &str) -> Condition {
    leaf(format!("{} IS NULL", back_quote(column)), Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySql, Postgres};
    use crate::error::TemplateErrorKind;
    use crate::value::Value;

    #[test]
    fn single_child_is_returned_unchanged() {
        let c = and([eq("a", 1)]);
        assert!(matches!(c, Condition::Leaf { negated: false, .. }));
        let c = or([is_null("a")]);
        assert_eq!(c.expand(&MySql).unwrap().sql, "`a` IS NULL");
    }

    #[test]
    fn same_operator_extends_flat() {
        let c = eq("a", 1).and(eq("b", 2)).and(eq("c", 3));
        match &c {
            Condition::Group { and, children, .. } => {
                assert!(*and);
                assert_eq!(children.len(), 3);
            }
            other => panic!("expected group, got {other:?}"),
        }
        assert_eq!(
            c.expand(&MySql).unwrap().sql,
            "(`a`=?) AND (`b`=?) AND (`c`=?)"
        );
    }

    #[test]
    fn different_operator_nests() {
        let c = eq("a", 1).and(eq("b", 2)).or(eq("c", 3));
        assert_eq!(
            c.expand(&Postgres).unwrap().sql,
            "((\"a\"=$1) AND (\"b\"=$2)) OR (\"c\"=$3)"
        );
    }

    #[test]
    fn negating_a_group_negates_children_and_flips_operator() {
        let c = and([has_prefix("c1", "v1"), gt("c2", 1)]).not();
        let built = c.expand(&MySql).unwrap();
        assert_eq!(built.sql, "(NOT (`c1` LIKE ?)) OR (NOT (`c2`>?))");
        assert_eq!(built.args, vec![Value::from("v1%"), Value::Int(1)]);

        let back = and([eq("a", 1), eq("b", 2)]).not().not();
        assert_eq!(back.expand(&MySql).unwrap().sql, "(`a`=?) AND (`b`=?)");
    }

    #[test]
    fn negating_a_leaf_toggles() {
        assert_eq!(
            le("count", 3).not().expand(&MySql).unwrap().sql,
            "NOT (`count`<=?)"
        );
        assert_eq!(le("count", 3).not().not().expand(&MySql).unwrap().sql, "`count`<=?");
    }

    #[test]
    fn eq_with_null_becomes_is_null() {
        let built = eq("c3", None::<i64>).expand(&MySql).unwrap();
        assert_eq!(built.sql, "`c3` IS NULL");
        assert!(built.args.is_empty());
    }

    #[test]
    fn first_child_error_wins() {
        let bad = Condition::from(Expr::text("`open"));
        let c = and([eq("a", 1), bad, Condition::from(Expr::text(""))]);
        match c.expand(&MySql) {
            Err(OrmError::Template { kind, .. }) => assert_eq!(kind, TemplateErrorKind::UnmatchedQuote),
            other => panic!("unexpected {other:?}"),
        }

        let extended = eq("a", 1).and(eq("b", 2)).and(Condition::from(Expr::text("")));
        assert!(extended.error().is_some());
    }

    #[test]
    fn like_helpers_escape() {
        let built = contains("c4", r"\%_").expand(&MySql).unwrap();
        assert_eq!(built.sql, "`c4` LIKE ?");
        assert_eq!(built.args, vec![Value::from(r"%\\\%\_%")]);
        assert_eq!(
            has_suffix("c", "x").expand(&MySql).unwrap().args,
            vec![Value::from("%x")]
        );
    }

    #[test]
    fn in_and_between() {
        let built = in_list("t2..c2", ["v1", "v2", "v3"]).expand(&Postgres).unwrap();
        assert_eq!(built.sql, "\"t2.c2\" IN ($1,$2,$3)");
        let built = between("c5", 2, 3).expand(&MySql).unwrap();
        assert_eq!(built.sql, "`c5` BETWEEN ? AND ?");
        assert_eq!(built.args, vec![Value::Int(2), Value::Int(3)]);
    }
}
