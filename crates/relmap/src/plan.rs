//! Statement planning from entity descriptors.
//!
//! Each planner reads a live record (and stamps its timestamp fields where
//! the operation requires it) and returns an unexpanded statement builder.
//! Nothing is executed; expand the result with the target dialect.
//!
//! ```ignore
//! let users = relmap::resolve::<User>()?;
//! let built = plan::update_by_key(&users, &mut user, &ColumnSelection::All, Utc::now())?
//!     .expand(&Postgres)?;
//! ```

use std::any::Any;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::condition::{eq, in_list, in_subquery};
use crate::error::{OrmError, OrmResult};
use crate::expr::{Arg, Expr};
use crate::query::{self, Delete, Insert, Select, Update, whole_seconds};
use crate::record::{ColumnFilter, ColumnSelection};
use crate::schema::{EntityDescriptor, FieldDescriptor, JunctionDescriptor, RelationKind};
use crate::value::Value;

fn key_value<'d>(
    desc: &'d EntityDescriptor,
    record: &dyn Any,
) -> OrmResult<(&'d FieldDescriptor, Value)> {
    let key = desc.require_primary_key()?;
    let value = key.get_value(record)?;
    Ok((key, value))
}

fn find_field<'d>(desc: &'d EntityDescriptor, name: &str) -> OrmResult<&'d FieldDescriptor> {
    desc.find_field(name)
        .ok_or_else(|| OrmError::not_found(format!("field {}.{name}", desc.name())))
}

fn related_of(field: &FieldDescriptor) -> OrmResult<Arc<EntityDescriptor>> {
    field
        .related()
        .ok_or_else(|| OrmError::not_found(format!("related entity of {}", field.full_name())))
}

/// Selectable columns of `desc`, optionally without the primary key.
fn select_columns<'d>(
    desc: &'d EntityDescriptor,
    filter: &ColumnFilter<'_>,
    skip_key: bool,
) -> Vec<&'d str> {
    desc.columns()
        .filter(|f| !(skip_key && f.is_primary_key()) && filter.admits(f))
        .map(FieldDescriptor::column)
        .collect()
}

// ==================== CRUD ====================

/// INSERT of one or more records over every column except multi-valued
/// relations and the auto-increment field.
///
/// Create and update timestamp fields are set to `now`, truncated to whole
/// seconds, on each record before it is read.
pub fn insert<'r, T: Any>(
    desc: &EntityDescriptor,
    records: impl IntoIterator<Item = &'r mut T>,
    now: DateTime<Utc>,
) -> OrmResult<Insert> {
    let now = whole_seconds(now);
    let columns: Vec<&FieldDescriptor> =
        desc.columns().filter(|f| !f.is_auto_increment()).collect();
    if columns.is_empty() {
        return Err(OrmError::statement(
            "insert",
            format!("no columns on {}", desc.name()),
        ));
    }

    let mut statement = query::insert(desc.table()).columns(columns.iter().map(|f| f.column()));
    for record in records {
        let mut row = Vec::with_capacity(columns.len());
        for field in &columns {
            if field.is_created_at() || field.is_updated_at() {
                field.set_value(&mut *record, Value::Timestamp(now))?;
                row.push(Value::Timestamp(now));
            } else {
                row.push(field.get_value(&*record)?);
            }
        }
        statement = statement.values(row);
    }

    if statement.row_count() == 0 {
        return Err(OrmError::statement("insert", "empty batch"));
    }
    tracing::debug!(
        target: "relmap::plan",
        entity = desc.name(),
        rows = statement.row_count(),
        "insert planned"
    );
    Ok(statement)
}

/// SELECT of the selected columns, primary key excluded, by primary key.
pub fn select_by_key(
    desc: &EntityDescriptor,
    record: &dyn Any,
    selection: &ColumnSelection,
) -> OrmResult<Select> {
    let (key, value) = key_value(desc, record)?;
    let filter = selection.filter(desc)?;
    let columns = select_columns(desc, &filter, true);
    if columns.is_empty() {
        return Err(OrmError::statement(
            "select",
            format!("no columns on {}", desc.name()),
        ));
    }

    tracing::debug!(target: "relmap::plan", entity = desc.name(), "select by key planned");
    Ok(query::select(columns)
        .from(desc.table())
        .filter(eq(key.column(), value)))
}

/// UPDATE of the selected columns by primary key.
///
/// The primary key and the create timestamp are never written. The update
/// timestamp is always refreshed to `now`, on the record and in the
/// statement, whatever the selection says.
pub fn update_by_key(
    desc: &EntityDescriptor,
    record: &mut dyn Any,
    selection: &ColumnSelection,
    now: DateTime<Utc>,
) -> OrmResult<Update> {
    let (key, value) = key_value(desc, record)?;
    let filter = selection.filter(desc)?;
    let now = whole_seconds(now);

    let mut statement = query::update(desc.table()).filter(eq(key.column(), value));
    for field in desc.columns() {
        if field.is_primary_key() || field.is_created_at() {
            continue;
        }
        if field.is_updated_at() {
            field.set_value(record, Value::Timestamp(now))?;
            statement = statement.set(field.column(), now);
        } else if filter.admits(field) {
            statement = statement.set(field.column(), field.get_value(record)?);
        }
    }

    tracing::debug!(target: "relmap::plan", entity = desc.name(), "update by key planned");
    Ok(statement)
}

/// DELETE by primary key.
pub fn delete_by_key(desc: &EntityDescriptor, record: &dyn Any) -> OrmResult<Delete> {
    let (key, value) = key_value(desc, record)?;
    tracing::debug!(target: "relmap::plan", entity = desc.name(), "delete by key planned");
    Ok(query::delete(desc.table()).filter(eq(key.column(), value)))
}

/// SELECT of the rows a relation field of `record` points at.
///
/// To-one relations select the related row by its key (key column
/// excluded). One-to-many selects related rows whose relation column holds
/// the owner key. Many-to-many selects related rows whose key is in the
/// junction, or through entity, rows of the owner. `selection` applies to
/// the related entity.
pub fn select_relation(
    desc: &EntityDescriptor,
    record: &dyn Any,
    field: &str,
    selection: &ColumnSelection,
) -> OrmResult<Select> {
    let relation = find_field(desc, field)?;
    let Some(kind) = relation.relation() else {
        return Err(OrmError::statement(
            "select relation",
            format!("{} is not a relation", relation.full_name()),
        ));
    };
    let related = related_of(relation)?;
    let related_key = related.require_primary_key()?;
    let filter = selection.filter(&related)?;

    let condition = match kind {
        RelationKind::OneToOne | RelationKind::ManyToOne => {
            let value = relation.get_value(record)?;
            if value.is_null() {
                return Err(OrmError::statement(
                    "select relation",
                    format!("{} is not set", relation.full_name()),
                ));
            }
            eq(related_key.column(), value)
        }
        RelationKind::OneToMany => {
            let (_, owner) = key_value(desc, record)?;
            eq(relation.column(), owner)
        }
        RelationKind::ManyToMany => {
            let (_, owner) = key_value(desc, record)?;
            let junction = relation.junction().ok_or_else(|| {
                OrmError::not_found(format!("junction of {}", relation.full_name()))
            })?;
            let pairs = query::select([junction.storage_right()])
                .from(junction.storage_table())
                .filter(eq(junction.storage_left(), owner));
            in_subquery(related_key.column(), Expr::new("(?)", [Arg::from(pairs)]))
        }
    };

    let columns = select_columns(&related, &filter, kind.is_to_one());
    if columns.is_empty() {
        return Err(OrmError::statement(
            "select relation",
            format!("no columns on {}", related.name()),
        ));
    }

    tracing::debug!(
        target: "relmap::plan",
        entity = desc.name(),
        field = relation.name(),
        "select relation planned"
    );
    Ok(query::select(columns)
        .from(related.table())
        .filter(condition))
}

// ==================== Junction ====================

/// Statements managing the pairs of one many-to-many field of one record.
///
/// Pairs live in the junction table, or in the through entity's table when
/// one is declared. The related records passed in must be of the related
/// entity's type.
#[derive(Debug)]
pub struct Junction<'d> {
    field: &'d FieldDescriptor,
    junction: &'d JunctionDescriptor,
    related: Arc<EntityDescriptor>,
    left: Value,
}

impl<'d> Junction<'d> {
    pub fn new(desc: &'d EntityDescriptor, record: &dyn Any, field: &str) -> OrmResult<Self> {
        let field = find_field(desc, field)?;
        if field.relation() != Some(RelationKind::ManyToMany) {
            return Err(OrmError::statement(
                "many to many",
                format!("{} is not many_to_many", field.full_name()),
            ));
        }
        let junction = field.junction().ok_or_else(|| {
            OrmError::not_found(format!("junction of {}", field.full_name()))
        })?;
        let related = related_of(field)?;
        let (_, left) = key_value(desc, record)?;
        Ok(Self {
            field,
            junction,
            related,
            left,
        })
    }

    fn rights<R: Any>(&self, others: &[R]) -> OrmResult<Vec<Value>> {
        if !self.related.is::<R>() {
            return Err(OrmError::conversion(
                self.field.full_name(),
                format!("expected {} records", self.related.name()),
            ));
        }
        let key = self.related.require_primary_key()?;
        others.iter().map(|other| key.get_value(other)).collect()
    }

    fn owner(&self) -> crate::Condition {
        eq(self.junction.storage_left(), self.left.clone())
    }

    /// Remove every pair of the owner.
    pub fn empty(&self) -> Delete {
        query::delete(self.junction.storage_table()).filter(self.owner())
    }

    /// `SELECT COUNT(*)` of the pair (owner, `other`), limited to one row.
    pub fn has<R: Any>(&self, other: &R) -> OrmResult<Select> {
        let right = self
            .rights(std::slice::from_ref(other))?
            .pop()
            .unwrap_or(Value::Null);
        Ok(Select::new()
            .column(Expr::text("COUNT(*)"))
            .from(self.junction.storage_table())
            .filter(self.owner())
            .filter(eq(self.junction.storage_right(), right))
            .limit(1))
    }

    /// Insert a pair per related record.
    pub fn add<R: Any>(&self, others: &[R]) -> OrmResult<Insert> {
        let mut statement = query::insert(self.junction.storage_table()).columns([
            self.junction.storage_left(),
            self.junction.storage_right(),
        ]);
        for right in self.rights(others)? {
            statement = statement.values([self.left.clone(), right]);
        }
        tracing::debug!(
            target: "relmap::plan",
            field = %self.field.full_name(),
            rows = statement.row_count(),
            "junction add planned"
        );
        Ok(statement)
    }

    /// Replace the owner's pairs: run the delete, then the insert.
    pub fn set<R: Any>(&self, others: &[R]) -> OrmResult<(Delete, Insert)> {
        Ok((self.empty(), self.add(others)?))
    }

    /// Remove the pairs of the given related records.
    pub fn remove<R: Any>(&self, others: &[R]) -> OrmResult<Delete> {
        let rights = self.rights(others)?;
        Ok(query::delete(self.junction.storage_table())
            .filter(self.owner())
            .filter(in_list(self.junction.storage_right(), rights)))
    }
}
