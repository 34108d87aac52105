//! Convenient imports for typical `relmap` usage.
//!
//! ```ignore
//! use relmap::prelude::*;
//! ```

pub use crate::{
    Arg, BuiltQuery, Condition, Dialect, Entity, EntityDef, EntityDescriptor, Expr, Expression,
    MySql, OrmError, OrmResult, Postgres, Resolver, Sqlite, Value, ValueKind, resolve,
};
