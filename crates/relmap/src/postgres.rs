//! Binding [`Value`] arguments with `tokio-postgres`.
//!
//! ```ignore
//! let built = query.expand(&relmap::Postgres)?;
//! let rows = client.query(&built.sql, &built.params()).await?;
//! ```
//!
//! Integers are narrowed to the parameter's column type and rejected when
//! out of range, so an `i64` field can bind to an `int4` column.

use std::error::Error;

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use tokio_postgres::types::{IsNull, ToSql, Type};

use crate::expr::BuiltQuery;
use crate::value::Value;

type BoxError = Box<dyn Error + Sync + Send>;

fn checked<T: ToSql>(value: T, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if !T::accepts(ty) {
        return Err(format!("cannot bind {} to a {ty} parameter", std::any::type_name::<T>()).into());
    }
    value.to_sql(ty, out)
}

fn integer(v: i128, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    let out_of_range = || format!("integer {v} out of range for {ty}");
    match *ty {
        Type::INT2 => checked(i16::try_from(v).map_err(|_| out_of_range())?, ty, out),
        Type::INT4 => checked(i32::try_from(v).map_err(|_| out_of_range())?, ty, out),
        Type::OID => checked(u32::try_from(v).map_err(|_| out_of_range())?, ty, out),
        Type::FLOAT4 => checked(v as f32, ty, out),
        Type::FLOAT8 => checked(v as f64, ty, out),
        _ => checked(i64::try_from(v).map_err(|_| out_of_range())?, ty, out),
    }
}

fn timestamp(v: &DateTime<Utc>, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::TIMESTAMP => checked(v.naive_utc(), ty, out),
        Type::DATE => checked(v.date_naive(), ty, out),
        _ => checked(*v, ty, out),
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => checked(*v, ty, out),
            Value::Int(v) => integer(i128::from(*v), ty, out),
            Value::UInt(v) => integer(i128::from(*v), ty, out),
            Value::Float(v) if *ty == Type::FLOAT4 => checked(*v as f32, ty, out),
            Value::Float(v) => checked(*v, ty, out),
            Value::Text(v) => checked(v.as_str(), ty, out),
            Value::Bytes(v) => checked(v.as_slice(), ty, out),
            Value::Timestamp(v) => timestamp(v, ty, out),
        }
    }

    // Per-variant checks happen in `to_sql`; NULL binds to anything.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

impl BuiltQuery {
    /// Arguments as a parameter slice for `tokio-postgres` calls.
    pub fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.args.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
    }
}
