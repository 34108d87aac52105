//! Registration-time description of a record type.

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::OrmResult;
use crate::schema::access::{
    Getter, LinkSlot, ScalarSlot, Setter, ToOneSlot, TypedGetter, TypedLink, TypedScalar,
    TypedSetter,
};
use crate::schema::naming::ColumnContext;
use crate::value::{AdapterValue, FieldValue, ValueKind};

/// A record type that maps onto a table.
///
/// `describe` lists the mapped fields in declaration order; the resolver
/// calls it once per resolver cache.
///
/// ```ignore
/// impl Entity for Node {
///     fn describe(def: &mut EntityDef<Self>) {
///         def.field("Id", |n| &n.id, |n| &mut n.id);
///         def.many_to_one::<Node, _>("Parent", |n| &n.parent, |n| &mut n.parent);
///         def.one_to_many::<Node>("Children");
///     }
/// }
/// ```
pub trait Entity: Default + Send + Sync + 'static {
    fn describe(def: &mut EntityDef<Self>);

    /// Per-type column naming hook, consulted after explicit overrides and
    /// before the resolver's naming strategy. `None` defers to the strategy.
    fn column_name(_ctx: &ColumnContext<'_>) -> Option<String> {
        None
    }
}

/// Entry point a related field uses to reach its target type without
/// knowing it statically.
#[derive(Clone, Copy)]
pub(crate) struct RelatedType {
    pub(crate) type_id: TypeId,
    pub(crate) draft: fn() -> Draft,
}

impl RelatedType {
    pub(crate) fn of<R: Entity>() -> Self {
        Self {
            type_id: TypeId::of::<R>(),
            draft: draft_of::<R>,
        }
    }
}

pub(crate) fn draft_of<T: Entity>() -> Draft {
    let mut def = EntityDef::<T> {
        table: None,
        name: None,
        fields: Vec::new(),
        entity: PhantomData,
    };
    T::describe(&mut def);

    let name = def.name.unwrap_or_else(|| short_type_name(std::any::type_name::<T>()));
    Draft {
        type_id: TypeId::of::<T>(),
        name,
        table: def.table,
        fields: def.fields,
        column_hook: T::column_name,
    }
}

/// Last path segment of a type name, generics stripped.
fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Unresolved description of one entity, as produced by `describe`.
pub(crate) struct Draft {
    pub(crate) type_id: TypeId,
    pub(crate) name: String,
    pub(crate) table: Option<String>,
    pub(crate) fields: Vec<FieldSpec>,
    pub(crate) column_hook: fn(&ColumnContext<'_>) -> Option<String>,
}

pub(crate) enum Shape {
    Scalar {
        kind: ValueKind,
        slot: Arc<dyn ScalarSlot>,
    },
    ToOne {
        related: RelatedType,
        slot: Arc<dyn LinkSlot>,
    },
    ToMany {
        related: RelatedType,
    },
}

pub(crate) struct ThroughSpec {
    pub(crate) entity: RelatedType,
    pub(crate) left: String,
    pub(crate) right: String,
}

pub(crate) struct FieldSpec {
    pub(crate) name: String,
    pub(crate) shape: Shape,
    pub(crate) column: Option<String>,
    pub(crate) tag: Option<String>,
    pub(crate) markers: Vec<String>,
    pub(crate) skip: bool,
    pub(crate) getter: Option<(ValueKind, Arc<dyn Getter>)>,
    pub(crate) setter: Option<(ValueKind, Arc<dyn Setter>)>,
    pub(crate) through: Option<ThroughSpec>,
}

impl FieldSpec {
    fn new(name: String, shape: Shape) -> Self {
        Self {
            name,
            shape,
            column: None,
            tag: None,
            markers: Vec::new(),
            skip: false,
            getter: None,
            setter: None,
            through: None,
        }
    }
}

// ==================== EntityDef ====================

/// Builder handed to [`Entity::describe`].
pub struct EntityDef<T> {
    table: Option<String>,
    name: Option<String>,
    fields: Vec<FieldSpec>,
    entity: PhantomData<fn(&T)>,
}

impl<T: Entity> EntityDef<T> {
    /// Storage name; defaults to the naming strategy applied to the entity name.
    pub fn table(&mut self, table: impl Into<String>) -> &mut Self {
        self.table = Some(table.into());
        self
    }

    /// Entity name; defaults to the type name without its module path.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// A plain column backed by a [`FieldValue`].
    pub fn field<V: FieldValue>(
        &mut self,
        name: impl Into<String>,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> FieldDef<'_, T> {
        let shape = Shape::Scalar {
            kind: V::KIND,
            slot: Arc::new(TypedScalar { get, get_mut }),
        };
        self.push(name.into(), shape)
    }

    /// A to-one relation whose kind comes from its markers
    /// (`one_to_one` or `many_to_one`).
    pub fn to_one<R: Entity, S: ToOneSlot<R>>(
        &mut self,
        name: impl Into<String>,
        get: fn(&T) -> &S,
        get_mut: fn(&mut T) -> &mut S,
    ) -> FieldDef<'_, T> {
        let shape = Shape::ToOne {
            related: RelatedType::of::<R>(),
            slot: Arc::new(TypedLink {
                get,
                get_mut,
                related: PhantomData,
            }),
        };
        self.push(name.into(), shape)
    }

    pub fn one_to_one<R: Entity, S: ToOneSlot<R>>(
        &mut self,
        name: impl Into<String>,
        get: fn(&T) -> &S,
        get_mut: fn(&mut T) -> &mut S,
    ) -> FieldDef<'_, T> {
        self.to_one::<R, S>(name, get, get_mut).marker("one_to_one")
    }

    pub fn many_to_one<R: Entity, S: ToOneSlot<R>>(
        &mut self,
        name: impl Into<String>,
        get: fn(&T) -> &S,
        get_mut: fn(&mut T) -> &mut S,
    ) -> FieldDef<'_, T> {
        self.to_one::<R, S>(name, get, get_mut).marker("many_to_one")
    }

    /// A multi-valued relation whose kind comes from its markers
    /// (`one_to_many` or `many_to_many`). It has no column of its own.
    pub fn to_many<R: Entity>(&mut self, name: impl Into<String>) -> FieldDef<'_, T> {
        let shape = Shape::ToMany {
            related: RelatedType::of::<R>(),
        };
        self.push(name.into(), shape)
    }

    pub fn one_to_many<R: Entity>(&mut self, name: impl Into<String>) -> FieldDef<'_, T> {
        self.to_many::<R>(name).marker("one_to_many")
    }

    pub fn many_to_many<R: Entity>(&mut self, name: impl Into<String>) -> FieldDef<'_, T> {
        self.to_many::<R>(name).marker("many_to_many")
    }

    fn push(&mut self, name: String, shape: Shape) -> FieldDef<'_, T> {
        self.fields.push(FieldSpec::new(name, shape));
        let index = self.fields.len() - 1;
        FieldDef {
            spec: &mut self.fields[index],
            entity: PhantomData,
        }
    }
}

// ==================== FieldDef ====================

/// Options for one field, returned by the [`EntityDef`] methods.
pub struct FieldDef<'a, T> {
    spec: &'a mut FieldSpec,
    entity: PhantomData<fn(&T)>,
}

impl<T: Entity> FieldDef<'_, T> {
    /// Explicit column name. On a many-to-many field this is the junction
    /// table, optionally followed by `|left` and `|right` column overrides.
    pub fn column(self, column: impl Into<String>) -> Self {
        self.spec.column = Some(column.into());
        self
    }

    /// Struct-tag style options: `"name|left|right,marker,marker"`, or `"-"`
    /// to skip the field.
    pub fn tag(self, tag: impl Into<String>) -> Self {
        self.spec.tag = Some(tag.into());
        self
    }

    /// Add a marker by name. Unknown markers fail resolution.
    pub fn marker(self, marker: impl Into<String>) -> Self {
        self.spec.markers.push(marker.into());
        self
    }

    pub fn primary_key(self) -> Self {
        self.marker("primary_key")
    }

    pub fn auto_increment(self) -> Self {
        self.marker("auto_increment")
    }

    /// Set to the insert time by planned inserts.
    pub fn created_at(self) -> Self {
        self.marker("auto_now_add")
    }

    /// Refreshed by planned inserts and updates.
    pub fn updated_at(self) -> Self {
        self.marker("auto_now")
    }

    pub fn skip(self) -> Self {
        self.spec.skip = true;
        self
    }

    /// Replace the field read with a custom encoder.
    pub fn getter<A: AdapterValue>(self, f: fn(&T) -> OrmResult<A>) -> Self {
        self.spec.getter = Some((A::KIND, Arc::new(TypedGetter { f })));
        self
    }

    /// Replace the field write with a custom decoder. Incoming values are
    /// coerced to `A` first.
    pub fn setter<A: AdapterValue>(self, f: fn(&mut T, A) -> OrmResult<()>) -> Self {
        self.spec.setter = Some((A::KIND, Arc::new(TypedSetter { f })));
        self
    }

    /// Getter and setter over the same adapter kind.
    pub fn adapter<A: AdapterValue>(
        self,
        get: fn(&T) -> OrmResult<A>,
        set: fn(&mut T, A) -> OrmResult<()>,
    ) -> Self {
        self.getter(get).setter(set)
    }

    /// Store a many-to-many relation in entity `X`, whose `left` and
    /// `right` fields are many-to-one relations to the owning and related
    /// entities.
    pub fn through<X: Entity>(self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.spec.through = Some(ThroughSpec {
            entity: RelatedType::of::<X>(),
            left: left.into(),
            right: right.into(),
        });
        self
    }
}
