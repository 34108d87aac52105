//! Entity resolution and the descriptor cache.
//!
//! Resolving a type works on a session-local working set:
//!
//! 1. Draft the root and every type reachable through relations and through
//!    entities, skipping types already in the cache. A type is registered
//!    in the working set before its relations are visited, so cycles stop
//!    at the first revisit.
//! 2. Analyze each draft: tags and markers, roles, primary key defaulting.
//! 3. Name every column, following primary key chains through to-one
//!    relations on demand.
//! 4. Freeze the drafts into descriptors and publish them under the write
//!    lock. The first descriptor published for a type wins; relation edges
//!    are linked to the cached winners.

use std::any::TypeId;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{OrmError, OrmResult, SchemaErrorKind};
use crate::schema::builder::{Draft, Entity, FieldSpec, RelatedType, Shape};
use crate::schema::descriptor::{
    Edge, EntityDescriptor, FieldAccess, FieldDescriptor, JunctionDescriptor, RelationKind,
    Roles, ThroughDescriptor,
};
use crate::schema::naming::{
    ColumnContext, DefaultNaming, JunctionContext, NamingStrategy, RelationContext,
};
use crate::value::ValueKind;

static GLOBAL: LazyLock<Resolver> = LazyLock::new(Resolver::new);

/// Resolve `T` with the process-wide resolver, which uses [`DefaultNaming`].
pub fn resolve<T: Entity>() -> OrmResult<Arc<EntityDescriptor>> {
    GLOBAL.resolve::<T>()
}

/// Builds and caches entity descriptors.
///
/// Cached descriptors live as long as the resolver; relation edges between
/// them are weak, so a descriptor kept after [`clear`](Self::clear) can no
/// longer navigate to related entities.
pub struct Resolver {
    naming: Arc<dyn NamingStrategy>,
    cache: RwLock<HashMap<TypeId, Arc<EntityDescriptor>>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("naming", &self.naming)
            .field("cached", &self.len())
            .finish()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self::with_naming(DefaultNaming::new())
    }

    pub fn with_naming(naming: impl NamingStrategy + 'static) -> Self {
        Self::with_shared_naming(Arc::new(naming))
    }

    pub fn with_shared_naming(naming: Arc<dyn NamingStrategy>) -> Self {
        Self {
            naming,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide resolver used by [`resolve`].
    pub fn global() -> &'static Resolver {
        &GLOBAL
    }

    pub fn naming(&self) -> &dyn NamingStrategy {
        self.naming.as_ref()
    }

    /// Resolve `T`, returning the cached descriptor when present.
    pub fn resolve<T: Entity>(&self) -> OrmResult<Arc<EntityDescriptor>> {
        self.resolve_type(RelatedType::of::<T>())
    }

    /// The cached descriptor of `T`, without resolving.
    pub fn cached<T: 'static>(&self) -> Option<Arc<EntityDescriptor>> {
        self.read().get(&TypeId::of::<T>()).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop every cached descriptor.
    pub fn clear(&self) {
        self.write().clear();
    }

    pub(crate) fn resolve_type(&self, root: RelatedType) -> OrmResult<Arc<EntityDescriptor>> {
        if let Some(found) = self.read().get(&root.type_id) {
            tracing::trace!(target: "relmap::schema", entity = %found.name, "cache hit");
            return Ok(Arc::clone(found));
        }

        let mut session = Session::collect(self, root);
        match session.run() {
            Ok(built) => self.publish(built, root.type_id),
            Err(err) => {
                tracing::warn!(target: "relmap::schema", error = %err, "entity resolution failed");
                Err(err)
            }
        }
    }

    fn publish(
        &self,
        built: Vec<EntityDescriptor>,
        root: TypeId,
    ) -> OrmResult<Arc<EntityDescriptor>> {
        let mut cache = self.write();

        let mut fresh = Vec::with_capacity(built.len());
        for descriptor in built {
            if let Entry::Vacant(slot) = cache.entry(descriptor.type_id) {
                let descriptor = Arc::new(descriptor);
                slot.insert(Arc::clone(&descriptor));
                fresh.push(descriptor);
            }
        }

        for descriptor in &fresh {
            for edge in descriptor.edges() {
                if let Some(target) = cache.get(&edge.type_id) {
                    // set once, under the write lock
                    let _ = edge.target.set(Arc::downgrade(target));
                }
            }
            tracing::debug!(
                target: "relmap::schema",
                entity = %descriptor.name,
                table = %descriptor.table,
                columns = descriptor.by_column.len(),
                "entity resolved"
            );
        }

        cache
            .get(&root)
            .cloned()
            .ok_or_else(|| OrmError::not_found("resolved entity missing from cache"))
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TypeId, Arc<EntityDescriptor>>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TypeId, Arc<EntityDescriptor>>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// ==================== Tags ====================

#[derive(Debug, Default, PartialEq)]
struct Tag {
    skip: bool,
    name: Option<String>,
    markers: Vec<String>,
}

/// `"name,marker,marker"`; `"-"` skips the field.
fn parse_tag(tag: &str) -> Tag {
    let tag = tag.trim();
    if tag == "-" {
        return Tag {
            skip: true,
            ..Tag::default()
        };
    }
    let mut parts = tag.split(',').map(str::trim);
    let name = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    let markers = parts.filter(|s| !s.is_empty()).map(str::to_string).collect();
    Tag {
        skip: false,
        name,
        markers,
    }
}

fn is_skipped(spec: &FieldSpec) -> bool {
    spec.skip || spec.tag.as_deref().is_some_and(|t| t.trim() == "-")
}

/// Split `table|left|right`. Empty segments mean no override.
fn split_junction_name(name: &str) -> Option<[Option<String>; 3]> {
    let parts: Vec<&str> = name.split('|').collect();
    if parts.len() > 3 {
        return None;
    }
    let part = |i: usize| {
        parts
            .get(i)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Some([part(0), part(1), part(2)])
}

fn related_of(shape: &Shape) -> Option<RelatedType> {
    match shape {
        Shape::Scalar { .. } => None,
        Shape::ToOne { related, .. } | Shape::ToMany { related } => Some(*related),
    }
}

// ==================== Session ====================

#[derive(Debug, Default, Clone, Copy)]
struct RoleIndex {
    primary_key: Option<usize>,
    auto_increment: Option<usize>,
    created_at: Option<usize>,
    updated_at: Option<usize>,
}

struct FieldPlan {
    spec: FieldSpec,
    relation: Option<RelationKind>,
    declared: ValueKind,
    name: Option<String>,
    left: Option<String>,
    right: Option<String>,
}

struct EntityPlan {
    type_id: TypeId,
    name: String,
    table: String,
    column_hook: fn(&ColumnContext<'_>) -> Option<String>,
    fields: Vec<FieldPlan>,
    roles: RoleIndex,
}

#[derive(Debug, Clone)]
struct KeyInfo {
    field: String,
    column: String,
    kind: ValueKind,
}

struct JunctionPlan {
    table: String,
    left: String,
    right: String,
    through: Option<ThroughPlan>,
}

struct ThroughPlan {
    type_id: TypeId,
    table: String,
    left_field: String,
    right_field: String,
    left_column: String,
    right_column: String,
}

/// A through entity field as seen from the many-to-many side.
struct ThroughField {
    name: String,
    relation: Option<RelationKind>,
    related: Option<TypeId>,
    column: String,
}

struct Session<'r> {
    naming: &'r dyn NamingStrategy,
    drafts: Vec<Draft>,
    plans: Vec<EntityPlan>,
    index: HashMap<TypeId, usize>,
    cached: HashMap<TypeId, Arc<EntityDescriptor>>,
    keys: HashMap<TypeId, KeyInfo>,
    visiting: Vec<TypeId>,
    columns: HashMap<(usize, usize), (String, ValueKind)>,
    junctions: HashMap<(usize, usize), JunctionPlan>,
}

fn schema_error(entity: &str, field: &str, kind: SchemaErrorKind) -> OrmError {
    OrmError::schema_field(entity, field, kind)
}

impl<'r> Session<'r> {
    /// Draft `root` and every uncached type reachable from it.
    fn collect(resolver: &'r Resolver, root: RelatedType) -> Self {
        let mut session = Self {
            naming: resolver.naming(),
            drafts: Vec::new(),
            plans: Vec::new(),
            index: HashMap::new(),
            cached: HashMap::new(),
            keys: HashMap::new(),
            visiting: Vec::new(),
            columns: HashMap::new(),
            junctions: HashMap::new(),
        };

        let mut pending = vec![root];
        while let Some(next) = pending.pop() {
            if session.index.contains_key(&next.type_id)
                || session.cached.contains_key(&next.type_id)
            {
                continue;
            }
            if let Some(found) = resolver.read().get(&next.type_id) {
                session.cached.insert(next.type_id, Arc::clone(found));
                continue;
            }

            let draft = (next.draft)();
            session.index.insert(draft.type_id, session.drafts.len());
            for spec in draft.fields.iter().filter(|s| !is_skipped(s)) {
                pending.extend(related_of(&spec.shape));
                pending.extend(spec.through.as_ref().map(|t| t.entity));
            }
            session.drafts.push(draft);
        }
        session
    }

    fn run(&mut self) -> OrmResult<Vec<EntityDescriptor>> {
        self.analyze()?;
        self.name_all()?;
        Ok(self.freeze())
    }

    // ==================== Analysis ====================

    fn analyze(&mut self) -> OrmResult<()> {
        let drafts = std::mem::take(&mut self.drafts);
        for draft in drafts {
            let plan = analyze_draft(draft, self.naming)?;
            self.plans.push(plan);
        }
        Ok(())
    }

    // ==================== Naming ====================

    fn name_all(&mut self) -> OrmResult<()> {
        for p in 0..self.plans.len() {
            // primary key first, so key errors are reported on the key field
            let order: Vec<usize> = self.plans[p]
                .roles
                .primary_key
                .into_iter()
                .chain((0..self.plans[p].fields.len()).filter(|&f| {
                    Some(f) != self.plans[p].roles.primary_key
                }))
                .collect();
            for f in order {
                self.name_field(p, f)?;
                if self.plans[p].fields[f].relation == Some(RelationKind::ManyToMany) {
                    self.junction(p, f)?;
                }
            }

            let plan = &self.plans[p];
            let mut seen = HashSet::new();
            for (f, field) in plan.fields.iter().enumerate() {
                if field.relation.is_some_and(RelationKind::is_many) {
                    continue;
                }
                if let Some((column, _)) = self.columns.get(&(p, f)) {
                    if !seen.insert(column.as_str()) {
                        return Err(schema_error(
                            &plan.name,
                            &field.spec.name,
                            SchemaErrorKind::DuplicateColumn(column.clone()),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn names(&self, id: TypeId) -> Option<(String, String)> {
        if let Some(&p) = self.index.get(&id) {
            let plan = &self.plans[p];
            return Some((plan.name.clone(), plan.table.clone()));
        }
        self.cached
            .get(&id)
            .map(|d| (d.name.clone(), d.table.clone()))
    }

    /// Primary key of `id`, `None` when the entity has none.
    fn key_of(&mut self, id: TypeId) -> OrmResult<Option<KeyInfo>> {
        if let Some(key) = self.keys.get(&id) {
            return Ok(Some(key.clone()));
        }

        let key = if let Some(&p) = self.index.get(&id) {
            let Some(pk) = self.plans[p].roles.primary_key else {
                return Ok(None);
            };
            if self.visiting.contains(&id) {
                return Err(OrmError::schema(
                    self.plans[p].name.clone(),
                    SchemaErrorKind::CyclicPrimaryKey,
                ));
            }
            self.visiting.push(id);
            let named = self.name_field(p, pk);
            self.visiting.pop();
            let (column, kind) = named?;
            KeyInfo {
                field: self.plans[p].fields[pk].spec.name.clone(),
                column,
                kind,
            }
        } else {
            let Some(key) = self.cached.get(&id).and_then(|d| d.primary_key()) else {
                return Ok(None);
            };
            KeyInfo {
                field: key.name.clone(),
                column: key.column.clone(),
                kind: key.kind,
            }
        };

        self.keys.insert(id, key.clone());
        Ok(Some(key))
    }

    /// Key of `id`, or a `MissingPrimaryKey` error reported on field `f` of
    /// plan `p`.
    fn require_key(
        &mut self,
        p: usize,
        f: usize,
        id: TypeId,
    ) -> OrmResult<(KeyInfo, String, String)> {
        let (name, table) = self
            .names(id)
            .ok_or_else(|| OrmError::not_found("related entity"))?;
        match self.key_of(id)? {
            Some(key) => Ok((key, name, table)),
            None => {
                let plan = &self.plans[p];
                Err(schema_error(
                    &plan.name,
                    &plan.fields[f].spec.name,
                    SchemaErrorKind::MissingPrimaryKey(name),
                ))
            }
        }
    }

    /// Override, then the owning type's hook, then the naming strategy.
    fn column_name(
        &self,
        p: usize,
        field: &str,
        relation: Option<(&KeyInfo, &str, &str)>,
    ) -> String {
        let plan = &self.plans[p];
        let ctx = ColumnContext {
            field,
            entity: &plan.name,
            table: &plan.table,
            relation: relation.map(|(key, entity, table)| RelationContext {
                entity,
                primary_key_field: &key.field,
                table,
                primary_key_column: &key.column,
            }),
        };
        (plan.column_hook)(&ctx).unwrap_or_else(|| self.naming.column_name(&ctx))
    }

    fn name_field(&mut self, p: usize, f: usize) -> OrmResult<(String, ValueKind)> {
        if let Some(named) = self.columns.get(&(p, f)) {
            return Ok(named.clone());
        }

        let owner = self.plans[p].type_id;
        let field = &self.plans[p].fields[f];
        let field_name = field.spec.name.clone();
        let name_override = field.name.clone();
        let relation = field.relation;
        let declared = field.declared;
        let related = related_of(&field.spec.shape);

        let named = match (relation, related) {
            (Some(RelationKind::OneToMany), _) => {
                let (key, name, table) = self.require_key(p, f, owner)?;
                let column = name_override.unwrap_or_else(|| {
                    self.column_name(p, &field_name, Some((&key, &name, &table)))
                });
                (column, ValueKind::Any)
            }
            (Some(RelationKind::ManyToMany), Some(related)) => {
                let (owner_name, owner_table) = {
                    let plan = &self.plans[p];
                    (plan.name.clone(), plan.table.clone())
                };
                let (right_name, right_table) = self
                    .names(related.type_id)
                    .ok_or_else(|| OrmError::not_found("related entity"))?;
                let table = name_override.unwrap_or_else(|| {
                    self.naming.junction_table_name(&JunctionContext {
                        field: &field_name,
                        left_entity: &owner_name,
                        left_table: &owner_table,
                        right_entity: &right_name,
                        right_table: &right_table,
                    })
                });
                (table, ValueKind::Any)
            }
            (Some(_), Some(related)) => {
                let (key, name, table) = self.require_key(p, f, related.type_id)?;
                let column = name_override.unwrap_or_else(|| {
                    self.column_name(p, &field_name, Some((&key, &name, &table)))
                });
                (column, key.kind)
            }
            _ => {
                let column =
                    name_override.unwrap_or_else(|| self.column_name(p, &field_name, None));
                (column, declared)
            }
        };

        self.columns.insert((p, f), named.clone());
        Ok(named)
    }

    fn junction(&mut self, p: usize, f: usize) -> OrmResult<()> {
        let owner = self.plans[p].type_id;
        let Some(related) = related_of(&self.plans[p].fields[f].spec.shape) else {
            return Ok(());
        };
        let (table, _) = self.name_field(p, f)?;
        let (owner_key, owner_name, owner_table) = self.require_key(p, f, owner)?;
        let (related_key, related_name, related_table) =
            self.require_key(p, f, related.type_id)?;

        let field = &self.plans[p].fields[f];
        let field_name = field.spec.name.clone();
        let left = field.left.clone().unwrap_or_else(|| {
            self.column_name(p, &field_name, Some((&owner_key, &owner_name, &owner_table)))
        });
        let right = field.right.clone().unwrap_or_else(|| {
            self.column_name(
                p,
                &field_name,
                Some((&related_key, &related_name, &related_table)),
            )
        });

        let through_spec = self.plans[p].fields[f]
            .spec
            .through
            .as_ref()
            .map(|t| (t.entity.type_id, t.left.clone(), t.right.clone()));
        let through = match through_spec {
            Some((through_id, left_name, right_name)) => Some(self.through(
                p,
                f,
                through_id,
                &left_name,
                &right_name,
                related.type_id,
            )?),
            None => None,
        };

        let (effective_left, effective_right) = match &through {
            Some(t) => (&t.left_column, &t.right_column),
            None => (&left, &right),
        };
        if effective_left == effective_right {
            return Err(schema_error(
                &self.plans[p].name,
                &field_name,
                SchemaErrorKind::DuplicateJunctionColumn(effective_left.clone()),
            ));
        }

        self.junctions.insert(
            (p, f),
            JunctionPlan {
                table,
                left,
                right,
                through,
            },
        );
        Ok(())
    }

    fn through(
        &mut self,
        p: usize,
        f: usize,
        through_id: TypeId,
        left: &str,
        right: &str,
        related: TypeId,
    ) -> OrmResult<ThroughPlan> {
        let owner = self.plans[p].type_id;
        let (through_name, through_table) = self
            .names(through_id)
            .ok_or_else(|| OrmError::not_found("through entity"))?;

        let check = |session: &mut Self, name: &str, expected: TypeId| -> OrmResult<ThroughField> {
            let found = session.through_field(through_id, name)?;
            let plan = &session.plans[p];
            let Some(found) = found else {
                return Err(schema_error(
                    &plan.name,
                    &plan.fields[f].spec.name,
                    SchemaErrorKind::ThroughFieldNotFound(format!("{through_name}.{name}")),
                ));
            };
            if found.relation != Some(RelationKind::ManyToOne) || found.related != Some(expected) {
                return Err(schema_error(
                    &plan.name,
                    &plan.fields[f].spec.name,
                    SchemaErrorKind::ThroughMismatch,
                ));
            }
            Ok(found)
        };

        let left = check(self, left, owner)?;
        let right = check(self, right, related)?;

        Ok(ThroughPlan {
            type_id: through_id,
            table: through_table,
            left_field: left.name,
            right_field: right.name,
            left_column: left.column,
            right_column: right.column,
        })
    }

    /// Field of the through entity by field name, then by column name.
    fn through_field(&mut self, id: TypeId, name: &str) -> OrmResult<Option<ThroughField>> {
        if let Some(&tp) = self.index.get(&id) {
            let fields = &self.plans[tp].fields;
            let by_name = fields.iter().position(|fp| fp.spec.name == name);
            let found = match by_name {
                Some(i) => Some(i),
                None => {
                    let mut by_column = None;
                    for i in 0..self.plans[tp].fields.len() {
                        if self.plans[tp].fields[i].relation.is_some_and(RelationKind::is_many) {
                            continue;
                        }
                        if self.name_field(tp, i)?.0 == name {
                            by_column = Some(i);
                            break;
                        }
                    }
                    by_column
                }
            };
            let Some(i) = found else {
                return Ok(None);
            };
            let (column, _) = self.name_field(tp, i)?;
            let field = &self.plans[tp].fields[i];
            return Ok(Some(ThroughField {
                name: field.spec.name.clone(),
                relation: field.relation,
                related: related_of(&field.spec.shape).map(|r| r.type_id),
                column,
            }));
        }

        Ok(self
            .cached
            .get(&id)
            .and_then(|d| d.find_field(name))
            .map(|field| ThroughField {
                name: field.name.clone(),
                relation: field.relation,
                related: field.related_type_id(),
                column: field.column.clone(),
            }))
    }

    // ==================== Freeze ====================

    fn freeze(&mut self) -> Vec<EntityDescriptor> {
        let plans = std::mem::take(&mut self.plans);
        plans
            .into_iter()
            .enumerate()
            .map(|(p, plan)| self.freeze_entity(p, plan))
            .collect()
    }

    fn freeze_entity(&mut self, p: usize, plan: EntityPlan) -> EntityDescriptor {
        let roles = plan.roles;
        let mut fields = Vec::with_capacity(plan.fields.len());
        let mut by_field = HashMap::new();
        let mut by_column = HashMap::new();

        for (f, field) in plan.fields.into_iter().enumerate() {
            let (column, kind) = self
                .columns
                .remove(&(p, f))
                .unwrap_or_else(|| (field.spec.name.clone(), field.declared));
            let junction = self.junctions.remove(&(p, f)).map(|j| JunctionDescriptor {
                table: j.table,
                left: j.left,
                right: j.right,
                through: j.through.map(|t| ThroughDescriptor {
                    edge: Edge::new(t.type_id),
                    table: t.table,
                    left_field: t.left_field,
                    right_field: t.right_field,
                    left_column: t.left_column,
                    right_column: t.right_column,
                }),
            });

            let spec = field.spec;
            let related = related_of(&spec.shape).map(|r| Edge::new(r.type_id));
            let access = match spec.shape {
                Shape::Scalar { slot, .. } => FieldAccess::Scalar(slot),
                Shape::ToOne { slot, .. } => FieldAccess::Link(slot),
                Shape::ToMany { .. } => FieldAccess::None,
            };

            by_field.insert(spec.name.clone(), f);
            if !field.relation.is_some_and(RelationKind::is_many) {
                by_column.insert(column.clone(), f);
            }

            fields.push(FieldDescriptor {
                entity: plan.name.clone(),
                name: spec.name,
                column,
                kind,
                relation: field.relation,
                related,
                roles: Roles {
                    primary_key: roles.primary_key == Some(f),
                    auto_increment: roles.auto_increment == Some(f),
                    created_at: roles.created_at == Some(f),
                    updated_at: roles.updated_at == Some(f),
                },
                access,
                getter: spec.getter,
                setter: spec.setter,
                junction,
            });
        }

        EntityDescriptor {
            type_id: plan.type_id,
            name: plan.name,
            table: plan.table,
            fields,
            by_field,
            by_column,
            primary_key: roles.primary_key,
            auto_increment: roles.auto_increment,
            created_at: roles.created_at,
            updated_at: roles.updated_at,
        }
    }
}

// ==================== Draft analysis ====================

fn set_role(
    slot: &mut Option<usize>,
    index: usize,
    duplicate: SchemaErrorKind,
) -> Result<(), SchemaErrorKind> {
    match *slot {
        Some(existing) if existing != index => Err(duplicate),
        _ => {
            *slot = Some(index);
            Ok(())
        }
    }
}

fn apply_marker(
    marker: &str,
    index: usize,
    declared: ValueKind,
    roles: &mut RoleIndex,
    relation: &mut Option<RelationKind>,
) -> Result<(), SchemaErrorKind> {
    match marker {
        "primary_key" => set_role(
            &mut roles.primary_key,
            index,
            SchemaErrorKind::MultiplePrimaryKeys,
        ),
        "auto_increment" => {
            if !declared.is_integer() {
                return Err(SchemaErrorKind::AutoIncrementNotInteger(declared));
            }
            set_role(
                &mut roles.auto_increment,
                index,
                SchemaErrorKind::MultipleRoles("auto_increment"),
            )
        }
        "auto_now_add" | "created_at" => {
            if declared != ValueKind::Timestamp {
                return Err(SchemaErrorKind::TimestampNotTime(declared));
            }
            if roles.updated_at == Some(index) {
                return Err(SchemaErrorKind::TimestampConflict);
            }
            set_role(
                &mut roles.created_at,
                index,
                SchemaErrorKind::MultipleRoles("auto_now_add"),
            )
        }
        "auto_now" | "updated_at" => {
            if declared != ValueKind::Timestamp {
                return Err(SchemaErrorKind::TimestampNotTime(declared));
            }
            if roles.created_at == Some(index) {
                return Err(SchemaErrorKind::TimestampConflict);
            }
            set_role(
                &mut roles.updated_at,
                index,
                SchemaErrorKind::MultipleRoles("auto_now"),
            )
        }
        other => match RelationKind::from_marker(other) {
            Some(kind) => match *relation {
                Some(existing) if existing != kind => Err(SchemaErrorKind::MultipleRelations),
                _ => {
                    *relation = Some(kind);
                    Ok(())
                }
            },
            None => Err(SchemaErrorKind::UnknownMarker(other.to_string())),
        },
    }
}

fn check_shape(shape: &Shape, relation: Option<RelationKind>) -> Result<(), SchemaErrorKind> {
    let message = match (shape, relation) {
        (Shape::Scalar { .. }, Some(kind)) => format!("{} on a plain field", kind.as_str()),
        (Shape::ToOne { .. }, Some(kind)) if kind.is_many() => {
            format!("{} on a to-one field", kind.as_str())
        }
        (Shape::ToMany { .. }, Some(kind)) if kind.is_to_one() => {
            format!("{} on a to-many field", kind.as_str())
        }
        (Shape::ToOne { .. } | Shape::ToMany { .. }, None) => {
            "relation field without a relation marker".to_string()
        }
        _ => return Ok(()),
    };
    Err(SchemaErrorKind::RelationShape(message))
}

fn analyze_draft(draft: Draft, naming: &dyn NamingStrategy) -> OrmResult<EntityPlan> {
    let Draft {
        type_id,
        name: entity,
        table,
        fields: specs,
        column_hook,
    } = draft;
    let table = table.unwrap_or_else(|| naming.table_name(&entity));

    let mut seen = HashSet::new();
    let mut roles = RoleIndex::default();
    let mut fields: Vec<FieldPlan> = Vec::with_capacity(specs.len());

    for spec in specs {
        if is_skipped(&spec) {
            continue;
        }
        let fail = |kind| schema_error(&entity, &spec.name, kind);

        if !seen.insert(spec.name.clone()) {
            return Err(fail(SchemaErrorKind::DuplicateField));
        }

        let index = fields.len();
        let declared = match &spec.shape {
            Shape::Scalar { kind, .. } => *kind,
            _ => ValueKind::Any,
        };
        let tag = spec.tag.as_deref().map(parse_tag).unwrap_or_default();

        let mut relation = None;
        for marker in spec.markers.iter().chain(tag.markers.iter()) {
            apply_marker(marker, index, declared, &mut roles, &mut relation).map_err(fail)?;
        }
        check_shape(&spec.shape, relation).map_err(fail)?;

        if relation.is_some() && (spec.getter.is_some() || spec.setter.is_some()) {
            return Err(fail(SchemaErrorKind::RelationAdapter));
        }
        if spec.through.is_some() && relation != Some(RelationKind::ManyToMany) {
            return Err(fail(SchemaErrorKind::RelationShape(
                "through on a field that is not many_to_many".to_string(),
            )));
        }
        if let (Some((getter, _)), Some((setter, _))) = (&spec.getter, &spec.setter) {
            if getter != setter {
                return Err(fail(SchemaErrorKind::AdapterKindMismatch {
                    getter: *getter,
                    setter: *setter,
                }));
            }
        }

        let name = spec.column.clone().or(tag.name);
        let (name, left, right) = match (relation, name) {
            (Some(RelationKind::ManyToMany), Some(name)) => {
                let [junction, left, right] = split_junction_name(&name)
                    .ok_or_else(|| fail(SchemaErrorKind::MalformedName(name.clone())))?;
                (junction, left, right)
            }
            (_, name) => (name, None, None),
        };

        fields.push(FieldPlan {
            spec,
            relation,
            declared,
            name,
            left,
            right,
        });
    }

    if fields.is_empty() {
        return Err(OrmError::schema(entity, SchemaErrorKind::NoColumns));
    }

    if roles.primary_key.is_none() {
        if roles.auto_increment.is_none() {
            roles.auto_increment = fields.iter().position(|f| {
                f.spec.name.eq_ignore_ascii_case("id")
                    && f.relation.is_none()
                    && f.declared.is_integer()
            });
        }
        roles.primary_key = roles.auto_increment;
    }

    if let Some(pk) = roles.primary_key {
        if fields[pk].relation.is_some_and(RelationKind::is_many) {
            return Err(schema_error(
                &entity,
                &fields[pk].spec.name,
                SchemaErrorKind::ManyRelationPrimaryKey,
            ));
        }
    }

    for role in [roles.auto_increment, roles.created_at, roles.updated_at]
        .into_iter()
        .flatten()
    {
        let field = &fields[role];
        if field.spec.getter.is_some() || field.spec.setter.is_some() {
            return Err(schema_error(
                &entity,
                &field.spec.name,
                SchemaErrorKind::RoleAdapter,
            ));
        }
    }

    Ok(EntityPlan {
        type_id,
        name: entity,
        table,
        column_hook,
        fields,
        roles,
    })
}
