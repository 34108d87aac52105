//! Record-type schema resolution.
//!
//! A record type implements [`Entity`] (usually through
//! `#[derive(Entity)]`) and lists its fields on an [`EntityDef`]. A
//! [`Resolver`] turns that description into an immutable
//! [`EntityDescriptor`]:
//!
//! - columns named by explicit override, then the type's
//!   [`Entity::column_name`] hook, then the resolver's [`NamingStrategy`]
//! - the primary key, defaulting to an integer `Id` field marked
//!   auto-increment
//! - auto-increment and create/update timestamp roles
//! - to-one, one-to-many and many-to-many relations, including junction
//!   tables stored in a through entity
//!
//! Descriptors are cached per resolver and shared as `Arc`s. Resolving a
//! type also resolves everything it reaches through relations, so cyclic
//! graphs (a `Node` whose parent is a `Node`) come out of a single call.

mod access;
mod builder;
mod descriptor;
mod naming;
mod resolver;

#[cfg(test)]
mod tests;

pub use access::ToOneSlot;
pub use builder::{Entity, EntityDef, FieldDef};
pub use descriptor::{EntityDescriptor, FieldDescriptor, JunctionDescriptor, RelationKind};
pub use naming::{
    ColumnContext, DefaultNaming, JunctionContext, NamingStrategy, RelationContext,
    SnakeCaseNaming,
};
pub use resolver::{Resolver, resolve};

