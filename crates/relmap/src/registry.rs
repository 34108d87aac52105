//! Link-time entity registration.
//!
//! `#[derive(Entity)]` submits an [`EntityRegistration`] for every
//! non-generic entity through `inventory`, so an application can resolve
//! all of its entities eagerly at startup and fail fast on schema errors:
//!
//! ```ignore
//! let failures = relmap::validate_registered(relmap::Resolver::global());
//! for (entity, err) in &failures {
//!     eprintln!("{entity}: {err}");
//! }
//! assert!(failures.is_empty());
//! ```

use std::sync::Arc;

use crate::error::{OrmError, OrmResult};
use crate::schema::{Entity, EntityDescriptor, Resolver};

/// Registration entry for one entity type.
pub struct EntityRegistration {
    /// Entity type name, for reporting.
    pub name: &'static str,
    /// Resolves the entity with the given resolver.
    pub resolve: fn(&Resolver) -> OrmResult<Arc<EntityDescriptor>>,
}

inventory::collect!(EntityRegistration);

/// `resolve` function pointer for `T`, used by generated registrations.
pub fn resolve_entity<T: Entity>(resolver: &Resolver) -> OrmResult<Arc<EntityDescriptor>> {
    resolver.resolve::<T>()
}

/// Every registration linked into the binary.
pub fn registered() -> impl Iterator<Item = &'static EntityRegistration> {
    inventory::iter::<EntityRegistration>.into_iter()
}

/// Resolve every registered entity, returning the ones that failed.
pub fn validate_registered(resolver: &Resolver) -> Vec<(&'static str, OrmError)> {
    let mut failures = Vec::new();
    let mut total = 0usize;
    for registration in registered() {
        total += 1;
        if let Err(err) = (registration.resolve)(resolver) {
            failures.push((registration.name, err));
        }
    }
    tracing::debug!(
        target: "relmap::schema",
        total,
        failed = failures.len(),
        "validated registered entities"
    );
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaErrorKind;
    use crate::schema::EntityDef;

    #[derive(Debug, Default)]
    struct RegisteredGood {
        id: i64,
    }

    impl Entity for RegisteredGood {
        fn describe(def: &mut EntityDef<Self>) {
            def.field("Id", |t| &t.id, |t| &mut t.id);
        }
    }

    #[derive(Debug, Default)]
    struct RegisteredBroken {
        id: i64,
    }

    impl Entity for RegisteredBroken {
        fn describe(def: &mut EntityDef<Self>) {
            def.field("Id", |t| &t.id, |t| &mut t.id).tag(",sharded");
        }
    }

    inventory::submit! {
        EntityRegistration {
            name: "RegisteredGood",
            resolve: resolve_entity::<RegisteredGood>,
        }
    }

    inventory::submit! {
        EntityRegistration {
            name: "RegisteredBroken",
            resolve: resolve_entity::<RegisteredBroken>,
        }
    }

    #[test]
    fn reports_failing_registrations() {
        let resolver = Resolver::new();
        let failures = validate_registered(&resolver);

        assert_eq!(failures.len(), 1);
        let (name, err) = &failures[0];
        assert_eq!(*name, "RegisteredBroken");
        assert_eq!(
            err.schema_kind(),
            Some(&SchemaErrorKind::UnknownMarker("sharded".into()))
        );
        assert!(resolver.cached::<RegisteredGood>().is_some());
        assert!(registered().count() >= 2);
    }
}
