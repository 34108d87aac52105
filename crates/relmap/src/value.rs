//! Dynamic values bound as statement arguments and read from record fields.
//!
//! [`Value`] is what flows out of an expansion as the argument list and what
//! field accessors hand back from a live record. [`ValueKind`] is the closed
//! set of kinds a field or adapter may declare.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The closed set of value kinds a field or adapter can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int,
    UInt,
    Float,
    Text,
    Bytes,
    Timestamp,
    /// Untyped passthrough
    Any,
}

impl ValueKind {
    /// Signed and unsigned integers are eligible for auto-increment.
    pub fn is_integer(self) -> bool {
        matches!(self, Self::Int | Self::UInt)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::Timestamp => "timestamp",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dynamically typed SQL value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// The kind of this value, `None` for `Null`.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(ValueKind::Bool),
            Self::Int(_) => Some(ValueKind::Int),
            Self::UInt(_) => Some(ValueKind::UInt),
            Self::Float(_) => Some(ValueKind::Float),
            Self::Text(_) => Some(ValueKind::Text),
            Self::Bytes(_) => Some(ValueKind::Bytes),
            Self::Timestamp(_) => Some(ValueKind::Timestamp),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    fn kind_name(&self) -> &'static str {
        self.kind().map_or("null", ValueKind::as_str)
    }
}

macro_rules! impl_value_from {
    ($($t:ty => $variant:ident via $conv:expr),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant($conv(v))
                }
            }
        )*
    };
}

impl_value_from!(
    bool => Bool via std::convert::identity,
    i8 => Int via i64::from,
    i16 => Int via i64::from,
    i32 => Int via i64::from,
    i64 => Int via std::convert::identity,
    u8 => UInt via u64::from,
    u16 => UInt via u64::from,
    u32 => UInt via u64::from,
    u64 => UInt via std::convert::identity,
    f32 => Float via f64::from,
    f64 => Float via std::convert::identity,
    String => Text via std::convert::identity,
    &str => Text via str::to_owned,
    Vec<u8> => Bytes via std::convert::identity,
    &[u8] => Bytes via <[u8]>::to_vec,
    DateTime<Utc> => Timestamp via std::convert::identity,
);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

pub(crate) fn mismatch(expected: ValueKind, got: &Value) -> String {
    format!("expected {expected}, got {}", got.kind_name())
}

// ==================== Field conversions ====================

/// A Rust type that can back a mapped field.
///
/// `from_value` is strict: the value must already have the field's kind.
/// `from_integer` is the widening/narrowing path used by auto-increment
/// fields and reports values that do not fit.
pub trait FieldValue: Sized + Send + Sync + 'static {
    const KIND: ValueKind;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, String>;

    fn from_integer(_value: i128) -> Option<Self> {
        None
    }
}

macro_rules! impl_integer_field {
    ($kind:ident, $variant:ident, $wide:ty: $($t:ty),*) => {
        $(
            impl FieldValue for $t {
                const KIND: ValueKind = ValueKind::$kind;

                fn to_value(&self) -> Value {
                    Value::$variant(<$wide>::from(*self))
                }

                fn from_value(value: Value) -> Result<Self, String> {
                    match value {
                        Value::$variant(v) => <$t>::try_from(v)
                            .map_err(|_| format!("{v} does not fit {}", stringify!($t))),
                        other => Err(mismatch(<Self as FieldValue>::KIND, &other)),
                    }
                }

                fn from_integer(value: i128) -> Option<Self> {
                    <$t>::try_from(value).ok()
                }
            }
        )*
    };
}

impl_integer_field!(Int, Int, i64: i8, i16, i32, i64);
impl_integer_field!(UInt, UInt, u64: u8, u16, u32, u64);

macro_rules! impl_exact_field {
    ($($t:ty => $kind:ident),* $(,)?) => {
        $(
            impl FieldValue for $t {
                const KIND: ValueKind = ValueKind::$kind;

                fn to_value(&self) -> Value {
                    Value::$kind(self.clone())
                }

                fn from_value(value: Value) -> Result<Self, String> {
                    match value {
                        Value::$kind(v) => Ok(v),
                        other => Err(mismatch(<Self as FieldValue>::KIND, &other)),
                    }
                }
            }
        )*
    };
}

impl_exact_field!(
    bool => Bool,
    String => Text,
    Vec<u8> => Bytes,
    DateTime<Utc> => Timestamp,
);

impl FieldValue for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Float(v) => Ok(v),
            other => Err(mismatch(<Self as FieldValue>::KIND, &other)),
        }
    }
}

impl FieldValue for f32 {
    const KIND: ValueKind = ValueKind::Float;

    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Float(v) => Ok(v as f32),
            other => Err(mismatch(<Self as FieldValue>::KIND, &other)),
        }
    }
}

impl FieldValue for Value {
    const KIND: ValueKind = ValueKind::Any;

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self, String> {
        Ok(value)
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: ValueKind = T::KIND;

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldValue::to_value)
    }

    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn from_integer(value: i128) -> Option<Self> {
        T::from_integer(value).map(Some)
    }
}

// ==================== Adapter values ====================

mod sealed {
    pub trait Sealed {}
}

/// Value types an adapter getter may return or a setter may accept.
///
/// Sealed: the set is `bool`, `i64`, `f64`, `String`, `Vec<u8>`,
/// `DateTime<Utc>` and `Value` for untyped passthrough.
pub trait AdapterValue: sealed::Sealed + Sized + Send + 'static {
    const KIND: ValueKind;

    fn into_value(self) -> Value;

    fn from_value(value: Value) -> Result<Self, String>;
}

macro_rules! impl_adapter_value {
    ($($t:ty),*) => {
        $(
            impl sealed::Sealed for $t {}

            impl AdapterValue for $t {
                const KIND: ValueKind = <$t as FieldValue>::KIND;

                fn into_value(self) -> Value {
                    FieldValue::to_value(&self)
                }

                fn from_value(value: Value) -> Result<Self, String> {
                    <$t as FieldValue>::from_value(value)
                }
            }
        )*
    };
}

impl_adapter_value!(bool, i64, f64, String, Vec<u8>, DateTime<Utc>, Value);

/// Convert a wire value into `target` using the fixed coercion table.
///
/// Text and bytes convert into each other, integers convert between
/// signedness when they fit, floats accept integers, and null is accepted
/// only as an empty byte sequence. Bool and timestamp must match exactly.
pub fn coerce(value: Value, target: ValueKind) -> Result<Value, String> {
    let coerced = match (target, value) {
        (ValueKind::Any, v) => v,
        (ValueKind::Bool, v @ Value::Bool(_)) => v,
        (ValueKind::Int, v @ Value::Int(_)) => v,
        (ValueKind::Int, Value::UInt(v)) => {
            Value::Int(i64::try_from(v).map_err(|_| format!("{v} does not fit int"))?)
        }
        (ValueKind::UInt, v @ Value::UInt(_)) => v,
        (ValueKind::UInt, Value::Int(v)) => {
            Value::UInt(u64::try_from(v).map_err(|_| format!("{v} does not fit uint"))?)
        }
        (ValueKind::Float, v @ Value::Float(_)) => v,
        (ValueKind::Float, Value::Int(v)) => Value::Float(v as f64),
        (ValueKind::Float, Value::UInt(v)) => Value::Float(v as f64),
        (ValueKind::Text, v @ Value::Text(_)) => v,
        (ValueKind::Text, Value::Bytes(v)) => Value::Text(
            String::from_utf8(v).map_err(|_| "bytes are not valid UTF-8".to_string())?,
        ),
        (ValueKind::Bytes, v @ Value::Bytes(_)) => v,
        (ValueKind::Bytes, Value::Text(v)) => Value::Bytes(v.into_bytes()),
        (ValueKind::Bytes, Value::Null) => Value::Bytes(Vec::new()),
        (ValueKind::Timestamp, v @ Value::Timestamp(_)) => v,
        (target, other) => return Err(mismatch(target, &other)),
    };
    Ok(coerced)
}
