//! Resolved, immutable entity and field descriptors.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::error::{OrmError, OrmResult};
use crate::schema::access::{Getter, LinkSlot, ScalarSlot, Setter};
use crate::value::{Value, ValueKind, coerce};

/// Relation kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl RelationKind {
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "one_to_one" => Some(Self::OneToOne),
            "many_to_one" | "foreign_key" => Some(Self::ManyToOne),
            "one_to_many" => Some(Self::OneToMany),
            "many_to_many" => Some(Self::ManyToMany),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneToOne => "one_to_one",
            Self::ManyToOne => "many_to_one",
            Self::OneToMany => "one_to_many",
            Self::ManyToMany => "many_to_many",
        }
    }

    /// Stored as a single column on the owning table.
    pub fn is_to_one(self) -> bool {
        matches!(self, Self::OneToOne | Self::ManyToOne)
    }

    /// No column on the owning table.
    pub fn is_many(self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }
}

/// A weak edge to another descriptor in the resolver cache.
pub(crate) struct Edge {
    pub(crate) type_id: TypeId,
    pub(crate) target: OnceLock<Weak<EntityDescriptor>>,
}

impl Edge {
    pub(crate) fn new(type_id: TypeId) -> Self {
        Self {
            type_id,
            target: OnceLock::new(),
        }
    }

    fn get(&self) -> Option<Arc<EntityDescriptor>> {
        self.target.get().and_then(Weak::upgrade)
    }
}

pub(crate) enum FieldAccess {
    Scalar(Arc<dyn ScalarSlot>),
    Link(Arc<dyn LinkSlot>),
    None,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Roles {
    pub(crate) primary_key: bool,
    pub(crate) auto_increment: bool,
    pub(crate) created_at: bool,
    pub(crate) updated_at: bool,
}

// ==================== Junction ====================

/// Storage of a many-to-many relation.
pub struct JunctionDescriptor {
    pub(crate) table: String,
    pub(crate) left: String,
    pub(crate) right: String,
    pub(crate) through: Option<ThroughDescriptor>,
}

pub(crate) struct ThroughDescriptor {
    pub(crate) edge: Edge,
    pub(crate) table: String,
    pub(crate) left_field: String,
    pub(crate) right_field: String,
    pub(crate) left_column: String,
    pub(crate) right_column: String,
}

impl JunctionDescriptor {
    /// Junction table name, from the override or the naming strategy.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Column referencing the owning entity.
    pub fn left(&self) -> &str {
        &self.left
    }

    /// Column referencing the related entity.
    pub fn right(&self) -> &str {
        &self.right
    }

    pub fn has_through(&self) -> bool {
        self.through.is_some()
    }

    /// The through entity, when one is declared.
    pub fn through(&self) -> Option<Arc<EntityDescriptor>> {
        self.through.as_ref().and_then(|t| t.edge.get())
    }

    /// Names of the through entity's left and right fields.
    pub fn through_fields(&self) -> Option<(&str, &str)> {
        self.through
            .as_ref()
            .map(|t| (t.left_field.as_str(), t.right_field.as_str()))
    }

    /// Table that actually stores the pairs: the through entity's table
    /// when declared, the junction table otherwise.
    pub fn storage_table(&self) -> &str {
        self.through.as_ref().map_or(&self.table, |t| &t.table)
    }

    pub fn storage_left(&self) -> &str {
        self.through.as_ref().map_or(&self.left, |t| &t.left_column)
    }

    pub fn storage_right(&self) -> &str {
        self.through.as_ref().map_or(&self.right, |t| &t.right_column)
    }
}

impl fmt::Debug for JunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JunctionDescriptor")
            .field("table", &self.table)
            .field("left", &self.left)
            .field("right", &self.right)
            .field("through", &self.through.as_ref().map(|t| &t.table))
            .finish()
    }
}

// ==================== Field ====================

/// One mapped field of an entity.
pub struct FieldDescriptor {
    pub(crate) entity: String,
    pub(crate) name: String,
    /// Column name; for many-to-many the junction table name
    pub(crate) column: String,
    pub(crate) kind: ValueKind,
    pub(crate) relation: Option<RelationKind>,
    pub(crate) related: Option<Edge>,
    pub(crate) roles: Roles,
    pub(crate) access: FieldAccess,
    pub(crate) getter: Option<(ValueKind, Arc<dyn Getter>)>,
    pub(crate) setter: Option<(ValueKind, Arc<dyn Setter>)>,
    pub(crate) junction: Option<JunctionDescriptor>,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column name. For a one-to-many field this is the column on the
    /// related table; for a many-to-many field it is the junction table.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Declared kind. To-one relations report the kind of the related
    /// primary key; multi-valued relations report [`ValueKind::Any`].
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn relation(&self) -> Option<RelationKind> {
        self.relation
    }

    pub fn is_to_one(&self) -> bool {
        self.relation.is_some_and(RelationKind::is_to_one)
    }

    pub fn is_many(&self) -> bool {
        self.relation.is_some_and(RelationKind::is_many)
    }

    /// The related entity of a relation field.
    pub fn related(&self) -> Option<Arc<EntityDescriptor>> {
        self.related.as_ref().and_then(Edge::get)
    }

    pub fn related_type_id(&self) -> Option<TypeId> {
        self.related.as_ref().map(|e| e.type_id)
    }

    pub fn junction(&self) -> Option<&JunctionDescriptor> {
        self.junction.as_ref()
    }

    pub fn is_primary_key(&self) -> bool {
        self.roles.primary_key
    }

    pub fn is_auto_increment(&self) -> bool {
        self.roles.auto_increment
    }

    pub fn is_created_at(&self) -> bool {
        self.roles.created_at
    }

    pub fn is_updated_at(&self) -> bool {
        self.roles.updated_at
    }

    pub fn has_getter(&self) -> bool {
        self.getter.is_some()
    }

    pub fn has_setter(&self) -> bool {
        self.setter.is_some()
    }

    /// `Entity.field`, as used in error messages.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.entity, self.name)
    }

    fn conversion(&self, message: impl Into<String>) -> OrmError {
        OrmError::conversion(self.full_name(), message)
    }

    fn related_or_err(&self) -> OrmResult<Arc<EntityDescriptor>> {
        self.related()
            .ok_or_else(|| OrmError::not_found(format!("related entity of {}", self.full_name())))
    }

    fn related_key(&self) -> OrmResult<(Arc<EntityDescriptor>, usize)> {
        let related = self.related_or_err()?;
        let key = related.primary_key.ok_or_else(|| {
            OrmError::not_found(format!("primary key of {}", related.name))
        })?;
        Ok((related, key))
    }

    // ==================== Value access ====================

    /// Read the field from `record`.
    ///
    /// A to-one relation reads the related primary key, following chains of
    /// to-one keys, and yields `Null` when the relation is unset.
    pub fn get_value(&self, record: &dyn Any) -> OrmResult<Value> {
        if self.is_many() {
            return Err(self.conversion("multi-valued relation has no column value"));
        }
        if let Some((_, getter)) = &self.getter {
            return getter
                .get(record)
                .map_err(|e| e.into_error(&self.entity, &self.name));
        }
        match &self.access {
            FieldAccess::Scalar(slot) => slot
                .get(record)
                .map_err(|e| e.into_error(&self.entity, &self.name)),
            FieldAccess::Link(slot) => {
                let linked = slot
                    .get(record)
                    .map_err(|e| e.into_error(&self.entity, &self.name))?;
                match linked {
                    None => Ok(Value::Null),
                    Some(related_record) => {
                        let (related, key) = self.related_key()?;
                        related.fields[key].get_value(related_record)
                    }
                }
            }
            FieldAccess::None => Err(self.conversion("field has no accessor")),
        }
    }

    /// Write `value` into the field of `record`.
    ///
    /// The value must already have the field's kind, except that an
    /// auto-increment field accepts any integer that fits and a setter
    /// adapter coerces to its input kind. A to-one relation writes the
    /// related primary key, allocating absent related records on the way;
    /// `Null` clears the relation.
    pub fn set_value(&self, record: &mut dyn Any, value: Value) -> OrmResult<()> {
        if self.is_many() {
            return Err(self.conversion("multi-valued relation has no column value"));
        }
        if let Some((kind, setter)) = &self.setter {
            let value = coerce(value, *kind).map_err(|m| self.conversion(m))?;
            return setter
                .set(record, value)
                .map_err(|e| e.into_error(&self.entity, &self.name));
        }
        match &self.access {
            FieldAccess::Scalar(slot) => {
                let result = match value {
                    Value::Int(v) if self.roles.auto_increment => {
                        slot.set_integer(record, i128::from(v))
                    }
                    Value::UInt(v) if self.roles.auto_increment => {
                        slot.set_integer(record, i128::from(v))
                    }
                    other => slot.set(record, other),
                };
                result.map_err(|e| e.into_error(&self.entity, &self.name))
            }
            FieldAccess::Link(slot) => {
                if value.is_null() {
                    return slot
                        .clear(record)
                        .map_err(|e| e.into_error(&self.entity, &self.name));
                }
                let (related, key) = self.related_key()?;
                let related_record = slot
                    .get_or_insert(record)
                    .map_err(|e| e.into_error(&self.entity, &self.name))?;
                related.fields[key].set_value(related_record, value)
            }
            FieldAccess::None => Err(self.conversion("field has no accessor")),
        }
    }

    /// Write a value read back from the database.
    ///
    /// Non-null values are coerced to the setter's input kind, or to the
    /// field's declared kind, before [`set_value`](Self::set_value).
    pub fn scan(&self, record: &mut dyn Any, value: Value) -> OrmResult<()> {
        if value.is_null() {
            return self.set_value(record, value);
        }
        let target = self.setter.as_ref().map_or(self.kind, |(kind, _)| *kind);
        let value = coerce(value, target).map_err(|m| self.conversion(m))?;
        self.set_value(record, value)
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("kind", &self.kind)
            .field("relation", &self.relation)
            .field("roles", &self.roles)
            .field("getter", &self.getter.as_ref().map(|(k, _)| k))
            .field("setter", &self.setter.as_ref().map(|(k, _)| k))
            .field("junction", &self.junction)
            .finish()
    }
}

// ==================== Entity ====================

/// The resolved relational schema of one record type.
pub struct EntityDescriptor {
    pub(crate) type_id: TypeId,
    pub(crate) name: String,
    pub(crate) table: String,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) by_field: HashMap<String, usize>,
    pub(crate) by_column: HashMap<String, usize>,
    pub(crate) primary_key: Option<usize>,
    pub(crate) auto_increment: Option<usize>,
    pub(crate) created_at: Option<usize>,
    pub(crate) updated_at: Option<usize>,
}

impl EntityDescriptor {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Mapped fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Fields stored as columns on this table, in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.is_many())
    }

    /// Lookup by domain field name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_field.get(name).map(|&i| &self.fields[i])
    }

    /// Lookup by column name. Multi-valued relations have no column here.
    pub fn column(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_column.get(name).map(|&i| &self.fields[i])
    }

    /// Field name first, then column name.
    pub fn find_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.field(name).or_else(|| self.column(name))
    }

    /// Column name first, then field name.
    pub fn find_column(&self, name: &str) -> Option<&FieldDescriptor> {
        self.column(name).or_else(|| self.field(name))
    }

    pub fn primary_key(&self) -> Option<&FieldDescriptor> {
        self.primary_key.map(|i| &self.fields[i])
    }

    pub fn auto_increment(&self) -> Option<&FieldDescriptor> {
        self.auto_increment.map(|i| &self.fields[i])
    }

    pub fn created_at(&self) -> Option<&FieldDescriptor> {
        self.created_at.map(|i| &self.fields[i])
    }

    pub fn updated_at(&self) -> Option<&FieldDescriptor> {
        self.updated_at.map(|i| &self.fields[i])
    }

    /// Primary key or a `NotFound` error naming the entity.
    pub fn require_primary_key(&self) -> OrmResult<&FieldDescriptor> {
        self.primary_key()
            .ok_or_else(|| OrmError::not_found(format!("primary key of {}", self.name)))
    }

    pub(crate) fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.fields.iter().flat_map(|f| {
            f.related.iter().chain(
                f.junction
                    .iter()
                    .filter_map(|j| j.through.as_ref().map(|t| &t.edge)),
            )
        })
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("fields", &self.fields)
            .field("primary_key", &self.primary_key().map(|f| &f.name))
            .finish()
    }
}
