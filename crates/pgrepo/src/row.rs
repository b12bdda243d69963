//! Row mapping traits and utilities

use crate::compile::Record;
use crate::error::{OrmError, OrmResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Type};

/// Trait for types that can be built from a database row.
///
/// Implement this for your entity structs to use them with the typed
/// repository methods:
///
/// ```ignore
/// use pgrepo::{FromRow, OrmResult, RowExt};
///
/// struct Product {
///     id: i32,
///     name: String,
///     sku: Option<String>,
/// }
///
/// impl FromRow for Product {
///     fn from_row(row: &tokio_postgres::Row) -> OrmResult<Self> {
///         Ok(Self {
///             id: row.try_get_column("id")?,
///             name: row.try_get_column("name")?,
///             sku: row.try_get_column("sku")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a database row into Self
    fn from_row(row: &Row) -> OrmResult<Self>;
}

/// Extension trait for Row to provide typed access
pub trait RowExt {
    /// Try to get a column value, returning OrmError::Decode on failure
    fn try_get_column<T>(&self, column: &str) -> OrmResult<T>
    where
        T: for<'a> FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> OrmResult<T>
    where
        T: for<'a> FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| OrmError::decode(column, e.to_string()))
    }
}

/// Rows decode into property-keyed records.
///
/// Projections alias columns back to their property names, so the result
/// column labels are used as keys unchanged.
impl FromRow for Record {
    fn from_row(row: &Row) -> OrmResult<Self> {
        let mut record = Record::with_capacity(row.len());
        for (idx, column) in row.columns().iter().enumerate() {
            let value = decode_cell(row, idx, column.name(), column.type_())?;
            record.insert(column.name().to_string(), value);
        }
        Ok(record)
    }
}

fn get<'a, T>(row: &'a Row, idx: usize, name: &str) -> OrmResult<Option<T>>
where
    T: FromSql<'a>,
{
    row.try_get(idx)
        .map_err(|e| OrmError::decode(name, e.to_string()))
}

fn json_number(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

fn decode_cell(row: &Row, idx: usize, name: &str, ty: &Type) -> OrmResult<serde_json::Value> {
    use serde_json::Value as J;

    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx, name)?.map(J::from),
        Type::INT2 => get::<i16>(row, idx, name)?.map(J::from),
        Type::INT4 => get::<i32>(row, idx, name)?.map(J::from),
        Type::INT8 => get::<i64>(row, idx, name)?.map(J::from),
        Type::FLOAT4 => get::<f32>(row, idx, name)?.map(|v| json_number(f64::from(v))),
        Type::FLOAT8 => get::<f64>(row, idx, name)?.map(json_number),
        Type::NUMERIC => get::<Decimal>(row, idx, name)?.map(|d| match d.to_i64() {
            Some(i) if d.fract().is_zero() => J::from(i),
            _ => d.to_f64().map_or(J::Null, json_number),
        }),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            get::<String>(row, idx, name)?.map(J::String)
        }
        Type::UUID => get::<uuid::Uuid>(row, idx, name)?.map(|u| J::String(u.to_string())),
        Type::TIMESTAMPTZ => {
            get::<DateTime<Utc>>(row, idx, name)?.map(|t| J::String(t.to_rfc3339()))
        }
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx, name)?
            .map(|t| J::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        Type::DATE => get::<NaiveDate>(row, idx, name)?.map(|d| J::String(d.to_string())),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx, name)?,
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => {
            get::<Vec<Option<String>>>(row, idx, name)?.map(J::from)
        }
        Type::INT4_ARRAY => get::<Vec<Option<i32>>>(row, idx, name)?.map(J::from),
        Type::INT8_ARRAY => get::<Vec<Option<i64>>>(row, idx, name)?.map(J::from),
        Type::BOOL_ARRAY => get::<Vec<Option<bool>>>(row, idx, name)?.map(J::from),
        Type::FLOAT8_ARRAY => get::<Vec<Option<f64>>>(row, idx, name)?
            .map(|items| J::Array(items.into_iter().map(|v| v.map_or(J::Null, json_number)).collect())),
        Type::NUMERIC_ARRAY => get::<Vec<Option<Decimal>>>(row, idx, name)?.map(|items| {
            J::Array(
                items
                    .into_iter()
                    .map(|v| v.and_then(|d| d.to_f64()).map_or(J::Null, json_number))
                    .collect(),
            )
        }),
        ref other => {
            return Err(OrmError::decode(
                name,
                format!("unsupported column type {other}"),
            ));
        }
    };
    Ok(value.unwrap_or(J::Null))
}
