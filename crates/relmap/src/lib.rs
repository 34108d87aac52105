//! # relmap
//!
//! Record-to-relational schema resolution and a dialect-aware SQL expression
//! compiler.
//!
//! ## Features
//!
//! - **Schema resolution**: describe a record type once (by hand or with
//!   `#[derive(Entity)]`) and get a validated, cached [`EntityDescriptor`]
//!   with columns, primary key, timestamps and typed relations
//! - **Cyclic graphs**: self-referencing and mutually-referencing entities
//!   resolve without recursion blowups
//! - **Expression templates**: `` `table.column` `` identifiers and `?`
//!   markers expand per dialect, nested expressions splice their arguments
//! - **Conditions and statements**: AND/OR/NOT trees and
//!   insert/select/update/delete builders with deferred errors
//!
//! ## Quick start
//!
//! ```ignore
//! use relmap::prelude::*;
//! use relmap::condition::eq;
//! use relmap::query::select;
//!
//! #[derive(Debug, Default, Entity)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! let users = relmap::resolve::<User>()?;
//! let built = select(["name"])
//!     .from(users.table())
//!     .filter(eq("id", 7))
//!     .expand(&MySql)?;
//! assert_eq!(built.sql, "SELECT `name` FROM `User` WHERE (`id`=?)");
//! ```

/// Build a `Vec<Arg>` from mixed argument types.
///
/// ```ignore
/// let row = relmap::args![1, "name", None::<i64>];
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Arg>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Arg::from($arg)),+]
    };
}

/// Compile an expression template with positional arguments.
///
/// ```ignore
/// let e = relmap::expr!("`hits` + ?", 1);
/// ```
#[macro_export]
macro_rules! expr {
    ($template:expr $(, $arg:expr)* $(,)?) => {
        $crate::Expr::new($template, $crate::args![$($arg),*])
    };
}

/// Compile a template straight into a [`Condition`] leaf.
#[macro_export]
macro_rules! cond {
    ($($tt:tt)+) => {
        $crate::Condition::from($crate::expr!($($tt)+))
    };
}

pub mod condition;
pub mod config;
pub mod dialect;
pub mod error;
pub mod expr;
pub mod plan;
pub mod prelude;
pub mod query;
pub mod record;
pub mod registry;
pub mod schema;
pub mod value;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use condition::Condition;
pub use config::{MapperConfig, NamingKind};
pub use dialect::{Dialect, DialectKind, MySql, Postgres, Sqlite, dialect_for};
pub use error::{OrmError, OrmResult, SchemaErrorKind, TemplateErrorKind};
pub use expr::{Arg, BuiltQuery, Expander, Expr, Expression};
pub use query::{Delete, Insert, JoinKind, Select, Update};
pub use record::ColumnSelection;
pub use registry::{EntityRegistration, validate_registered};
pub use schema::{
    ColumnContext, DefaultNaming, Entity, EntityDef, EntityDescriptor, FieldDef,
    FieldDescriptor, JunctionContext, JunctionDescriptor, NamingStrategy, RelationContext,
    RelationKind, Resolver, SnakeCaseNaming, ToOneSlot, resolve,
};
pub use value::{AdapterValue, FieldValue, Value, ValueKind};

// Re-export inventory for use by derive macros
pub use inventory;

#[cfg(feature = "derive")]
pub use relmap_derive::Entity;
