//! Derive macros for relmap
//!
//! Provides `#[derive(Entity)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod common;
mod entity;

/// Derive `relmap::Entity` for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use relmap::Entity;
///
/// #[derive(Debug, Default, Entity)]
/// #[orm(table = "posts")]
/// struct Post {
///     #[orm(primary_key, auto_increment)]
///     id: i64,
///     title: String,
///     #[orm(many_to_one)]
///     author: Option<Box<Author>>,
///     #[orm(many_to_many, through(PostTag, left = "post", right = "tag"))]
///     tags: Vec<Tag>,
///     #[orm(created_at)]
///     created: chrono::DateTime<chrono::Utc>,
///     #[orm(skip)]
///     cached_html: Option<String>,
/// }
/// ```
///
/// # Attributes
///
/// Struct level:
/// - `#[orm(table = "name")]` - Table name (default: naming strategy)
/// - `#[orm(name = "Name")]` - Entity name (default: type name)
///
/// Field level:
/// - `#[orm(column = "name")]` - Column name, or junction table for many-to-many
/// - `#[orm(tag = "name,marker")]` - Raw tag string
/// - `#[orm(primary_key)]`, `#[orm(auto_increment)]`
/// - `#[orm(created_at)]`, `#[orm(updated_at)]`
/// - `#[orm(one_to_one)]`, `#[orm(many_to_one)]` on `Option<Box<R>>` / `Option<R>`
/// - `#[orm(one_to_many)]`, `#[orm(many_to_many)]` on `Vec<R>`
/// - `#[orm(through(Entity, left = "field", right = "field"))]`
/// - `#[orm(getter = path, setter = path)]` - Custom value adapters
/// - `#[orm(skip)]` - Not mapped
///
/// Non-generic entities are also registered for
/// `relmap::validate_registered`.
#[proc_macro_derive(Entity, attributes(orm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
