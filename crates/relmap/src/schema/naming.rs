//! Naming strategies for tables, columns and junction tables.

use std::fmt;

use heck::ToSnakeCase;

/// The related side of a relation column.
#[derive(Debug, Clone, Copy)]
pub struct RelationContext<'a> {
    /// Related entity name
    pub entity: &'a str,
    /// Related primary key field name
    pub primary_key_field: &'a str,
    /// Related table name
    pub table: &'a str,
    /// Related primary key column name
    pub primary_key_column: &'a str,
}

/// Inputs for naming one column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnContext<'a> {
    /// Domain field name
    pub field: &'a str,
    /// Owning entity name
    pub entity: &'a str,
    /// Owning table name
    pub table: &'a str,
    /// Set for relation columns
    pub relation: Option<RelationContext<'a>>,
}

/// Inputs for naming a many-to-many junction table.
#[derive(Debug, Clone, Copy)]
pub struct JunctionContext<'a> {
    pub field: &'a str,
    pub left_entity: &'a str,
    pub left_table: &'a str,
    pub right_entity: &'a str,
    pub right_table: &'a str,
}

/// Pluggable naming used when no explicit override or per-type hook
/// supplies a name.
pub trait NamingStrategy: fmt::Debug + Send + Sync {
    fn table_name(&self, entity: &str) -> String;

    fn column_name(&self, ctx: &ColumnContext<'_>) -> String;

    fn junction_table_name(&self, ctx: &JunctionContext<'_>) -> String;
}

fn prefixed(prefix: Option<&str>, name: String) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}{name}"),
        None => name,
    }
}

/// Names taken verbatim from the domain.
///
/// Columns use the field name, relation columns concatenate the related
/// entity name and its primary key field name (`Node` + `Id` = `NodeId`),
/// and junction tables concatenate both entity names in sorted order.
#[derive(Debug, Clone, Default)]
pub struct DefaultNaming {
    table_prefix: Option<String>,
}

impl DefaultNaming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = Some(prefix.into());
        self
    }
}

impl NamingStrategy for DefaultNaming {
    fn table_name(&self, entity: &str) -> String {
        prefixed(self.table_prefix.as_deref(), entity.to_string())
    }

    fn column_name(&self, ctx: &ColumnContext<'_>) -> String {
        match &ctx.relation {
            Some(rel) => format!("{}{}", rel.entity, rel.primary_key_field),
            None => ctx.field.to_string(),
        }
    }

    fn junction_table_name(&self, ctx: &JunctionContext<'_>) -> String {
        let (a, b) = sorted(ctx.left_entity, ctx.right_entity);
        prefixed(self.table_prefix.as_deref(), format!("{a}{b}"))
    }
}

/// snake_case names via `heck`.
///
/// `UserProfile` maps to `user_profile`, a relation column to
/// `<related entity>_<related key column>` (`user_id`), and a junction table
/// to both entity names sorted and joined with `_`.
#[derive(Debug, Clone, Default)]
pub struct SnakeCaseNaming {
    table_prefix: Option<String>,
}

impl SnakeCaseNaming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = Some(prefix.into());
        self
    }
}

impl NamingStrategy for SnakeCaseNaming {
    fn table_name(&self, entity: &str) -> String {
        prefixed(self.table_prefix.as_deref(), entity.to_snake_case())
    }

    fn column_name(&self, ctx: &ColumnContext<'_>) -> String {
        match &ctx.relation {
            Some(rel) => format!(
                "{}_{}",
                rel.entity.to_snake_case(),
                rel.primary_key_column.to_snake_case()
            ),
            None => ctx.field.to_snake_case(),
        }
    }

    fn junction_table_name(&self, ctx: &JunctionContext<'_>) -> String {
        let left = ctx.left_entity.to_snake_case();
        let right = ctx.right_entity.to_snake_case();
        let (a, b) = sorted(&left, &right);
        prefixed(self.table_prefix.as_deref(), format!("{a}_{b}"))
    }
}

fn sorted<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a > b { (b, a) } else { (a, b) }
}
