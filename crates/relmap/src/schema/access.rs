//! Type-erased field access.
//!
//! Descriptors are shared across entity types, so every typed accessor the
//! builder receives is wrapped in a trait object working on `dyn Any`. A
//! record of the wrong type is reported, never silently ignored.

use std::any::Any;
use std::marker::PhantomData;

use crate::error::OrmError;
use crate::schema::Entity;
use crate::value::{AdapterValue, FieldValue, Value};

/// Why an access through a slot failed.
#[derive(Debug)]
pub(crate) enum AccessError {
    WrongRecord,
    Value(String),
    Failed(OrmError),
}

impl AccessError {
    pub(crate) fn into_error(self, entity: &str, field: &str) -> OrmError {
        match self {
            Self::WrongRecord => {
                OrmError::conversion(format!("{entity}.{field}"), format!("record is not a {entity}"))
            }
            Self::Value(message) => OrmError::conversion(format!("{entity}.{field}"), message),
            Self::Failed(err) => err,
        }
    }
}

type AccessResult<T> = Result<T, AccessError>;

fn record<T: 'static>(record: &dyn Any) -> AccessResult<&T> {
    record.downcast_ref::<T>().ok_or(AccessError::WrongRecord)
}

fn record_mut<T: 'static>(record: &mut dyn Any) -> AccessResult<&mut T> {
    record.downcast_mut::<T>().ok_or(AccessError::WrongRecord)
}

// ==================== Scalars ====================

pub(crate) trait ScalarSlot: Send + Sync {
    fn get(&self, record: &dyn Any) -> AccessResult<Value>;
    fn set(&self, record: &mut dyn Any, value: Value) -> AccessResult<()>;
    /// Store an integer, narrowing into the field's width.
    fn set_integer(&self, record: &mut dyn Any, value: i128) -> AccessResult<()>;
}

pub(crate) struct TypedScalar<T, V> {
    pub(crate) get: fn(&T) -> &V,
    pub(crate) get_mut: fn(&mut T) -> &mut V,
}

impl<T: Entity, V: FieldValue> ScalarSlot for TypedScalar<T, V> {
    fn get(&self, rec: &dyn Any) -> AccessResult<Value> {
        Ok((self.get)(record::<T>(rec)?).to_value())
    }

    fn set(&self, rec: &mut dyn Any, value: Value) -> AccessResult<()> {
        let rec = record_mut::<T>(rec)?;
        *(self.get_mut)(rec) = V::from_value(value).map_err(AccessError::Value)?;
        Ok(())
    }

    fn set_integer(&self, rec: &mut dyn Any, value: i128) -> AccessResult<()> {
        let rec = record_mut::<T>(rec)?;
        let narrowed = V::from_integer(value).ok_or_else(|| {
            AccessError::Value(format!("{value} does not fit {}", std::any::type_name::<V>()))
        })?;
        *(self.get_mut)(rec) = narrowed;
        Ok(())
    }
}

// ==================== To-one links ====================

/// Storage of a to-one relation on the owning record.
///
/// Implemented for `Option<Box<R>>`, the usual shape for self-referencing
/// records, and `Option<R>`.
pub trait ToOneSlot<R>: Send + Sync + 'static {
    fn related(&self) -> Option<&R>;

    /// The related record, allocated with `Default` when absent.
    fn related_or_default(&mut self) -> &mut R;

    fn clear(&mut self);
}

impl<R: Entity> ToOneSlot<R> for Option<Box<R>> {
    fn related(&self) -> Option<&R> {
        self.as_deref()
    }

    fn related_or_default(&mut self) -> &mut R {
        self.get_or_insert_with(Box::default)
    }

    fn clear(&mut self) {
        *self = None;
    }
}

impl<R: Entity> ToOneSlot<R> for Option<R> {
    fn related(&self) -> Option<&R> {
        self.as_ref()
    }

    fn related_or_default(&mut self) -> &mut R {
        self.get_or_insert_with(R::default)
    }

    fn clear(&mut self) {
        *self = None;
    }
}

pub(crate) trait LinkSlot: Send + Sync {
    fn get<'a>(&self, record: &'a dyn Any) -> AccessResult<Option<&'a dyn Any>>;
    fn get_or_insert<'a>(&self, record: &'a mut dyn Any) -> AccessResult<&'a mut dyn Any>;
    fn clear(&self, record: &mut dyn Any) -> AccessResult<()>;
}

pub(crate) struct TypedLink<T, R, S> {
    pub(crate) get: fn(&T) -> &S,
    pub(crate) get_mut: fn(&mut T) -> &mut S,
    pub(crate) related: PhantomData<fn() -> R>,
}

impl<T: Entity, R: Entity, S: ToOneSlot<R>> LinkSlot for TypedLink<T, R, S> {
    fn get<'a>(&self, rec: &'a dyn Any) -> AccessResult<Option<&'a dyn Any>> {
        let rec = record::<T>(rec)?;
        Ok((self.get)(rec).related().map(|r| r as &dyn Any))
    }

    fn get_or_insert<'a>(&self, rec: &'a mut dyn Any) -> AccessResult<&'a mut dyn Any> {
        let rec = record_mut::<T>(rec)?;
        Ok((self.get_mut)(rec).related_or_default() as &mut dyn Any)
    }

    fn clear(&self, rec: &mut dyn Any) -> AccessResult<()> {
        (self.get_mut)(record_mut::<T>(rec)?).clear();
        Ok(())
    }
}

// ==================== Adapters ====================

pub(crate) trait Getter: Send + Sync {
    fn get(&self, record: &dyn Any) -> AccessResult<Value>;
}

pub(crate) trait Setter: Send + Sync {
    fn set(&self, record: &mut dyn Any, value: Value) -> AccessResult<()>;
}

pub(crate) struct TypedGetter<T, A> {
    pub(crate) f: fn(&T) -> crate::OrmResult<A>,
}

impl<T: Entity, A: AdapterValue> Getter for TypedGetter<T, A> {
    fn get(&self, rec: &dyn Any) -> AccessResult<Value> {
        (self.f)(record::<T>(rec)?)
            .map(AdapterValue::into_value)
            .map_err(AccessError::Failed)
    }
}

pub(crate) struct TypedSetter<T, A> {
    pub(crate) f: fn(&mut T, A) -> crate::OrmResult<()>,
}

impl<T: Entity, A: AdapterValue> Setter for TypedSetter<T, A> {
    fn set(&self, rec: &mut dyn Any, value: Value) -> AccessResult<()> {
        let rec = record_mut::<T>(rec)?;
        let value = A::from_value(value).map_err(AccessError::Value)?;
        (self.f)(rec, value).map_err(AccessError::Failed)
    }
}
