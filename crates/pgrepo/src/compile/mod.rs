//! Statement compilation.
//!
//! [`Compiler`] turns model metadata plus caller input (where trees, sort
//! specifications, value maps) into a [`CompiledQuery`]: SQL text with `$n`
//! placeholders and the ordered values bound to them.
//!
//! Placeholders are numbered strictly in the order parameters are appended to
//! the statement's [`ParamList`]: depth-first, left-to-right for where trees and
//! column-major for multi-row inserts.
//!
//! ```ignore
//! use pgrepo::compile::{Compiler, FindArgs};
//! use serde_json::json;
//!
//! let compiled = Compiler::new(&product, &registry).select(
//!     &FindArgs::new()
//!         .filter(json!({ "name": { "startsWith": "Bar" } }))
//!         .sort("name desc")
//!         .limit(10),
//! )?;
//! assert_eq!(
//!     compiled.sql,
//!     r#"SELECT "id","name" FROM "products" WHERE "name" ILIKE $1 ORDER BY "name" DESC LIMIT 10"#
//! );
//! ```

mod columns;
mod delete;
mod insert;
mod param;
mod select;
mod update;
mod where_clause;

pub use columns::{Sort, quote_ident};
pub use delete::DestroyOptions;
pub use insert::{ConflictAction, CreateOptions, OnConflict};
pub use param::ParamList;
pub use select::{FindArgs, Numeric};
pub use update::UpdateOptions;

use crate::error::{OrmError, OrmResult};
use crate::metadata::{Column, ModelMetadata, ModelRegistry};
use crate::value::Value;
use tokio_postgres::types::ToSql;

/// An entity's values keyed by property name.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A parameterized statement ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

impl CompiledQuery {
    fn new(sql: String, params: ParamList) -> Self {
        Self {
            sql,
            params: params.into_vec(),
        }
    }

    /// Get parameters as references compatible with tokio-postgres.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect()
    }
}

/// Which columns a mutation reports back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Returning {
    /// No RETURNING clause.
    None,
    /// Every materialized column.
    #[default]
    All,
    /// The listed properties (the primary key is always included).
    Columns(Vec<String>),
}

/// Compiles statements for one model.
///
/// The compiler holds only shared references to immutable metadata; every
/// statement owns its own parameter accumulator, so one compiler can be used
/// from many call sites at once.
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'a> {
    model: &'a ModelMetadata,
    registry: &'a ModelRegistry,
}

impl<'a> Compiler<'a> {
    pub fn new(model: &'a ModelMetadata, registry: &'a ModelRegistry) -> Self {
        Self { model, registry }
    }

    pub fn model(&self) -> &'a ModelMetadata {
        self.model
    }

    fn table(&self) -> String {
        quote_ident(self.model.table_name())
    }

    fn returning_clause(&self, returning: &Returning) -> OrmResult<String> {
        match returning {
            Returning::None => Ok(String::new()),
            Returning::All => Ok(format!(" RETURNING {}", self.columns_to_select(None)?)),
            Returning::Columns(cols) => Ok(format!(
                " RETURNING {}",
                self.columns_to_select(Some(cols.as_slice()))?
            )),
        }
    }

    /// Bind a value supplied for `column` in an INSERT or UPDATE.
    ///
    /// Nulls render as a literal `NULL`. Related-entity objects collapse to the
    /// related primary key. Arrays for json columns are serialized to text and
    /// cast, since array values otherwise bind as Postgres arrays.
    fn bind_column_value(
        &self,
        column: &Column,
        value: &serde_json::Value,
        params: &mut ParamList,
    ) -> OrmResult<String> {
        if value.is_null() {
            return Ok("NULL".to_string());
        }

        if column.related_model().is_some() {
            if let serde_json::Value::Object(obj) = value {
                let related = self.registry.require_related(self.model, column)?;
                let pk = related.primary_key().ok_or_else(|| {
                    OrmError::UndefinedValue(format!(
                        "model '{}' has no primary key to resolve {}.{}",
                        related.name(),
                        self.model.name(),
                        column.property_name
                    ))
                })?;
                return match obj.get(&pk.property_name) {
                    Some(pk_value) if !pk_value.is_null() => {
                        Ok(params.placeholder(Value::from(pk_value)))
                    }
                    _ => Err(OrmError::UndefinedValue(format!(
                        "value for {}.{} is missing primary key '{}'",
                        self.model.name(),
                        column.property_name,
                        pk.property_name
                    ))),
                };
            }
        }

        if column.is_json() {
            return match value {
                serde_json::Value::Array(_) => {
                    let text = serde_json::to_string(value).map_err(|e| {
                        OrmError::InvalidArgument(format!(
                            "unable to serialize {}: {e}",
                            column.property_name
                        ))
                    })?;
                    Ok(format!("{}::jsonb", params.placeholder(Value::Text(text))))
                }
                other => Ok(params.placeholder(Value::Json(other.clone()))),
            };
        }

        Ok(params.placeholder(Value::from(value)))
    }

    /// Bind a default or timestamp filled in for `column`.
    ///
    /// Json and relation columns go through [`bind_column_value`](Self::bind_column_value)
    /// so filled values follow the same protocol as supplied ones.
    fn bind_filled_value(
        &self,
        column: &Column,
        value: &Value,
        params: &mut ParamList,
    ) -> OrmResult<String> {
        if column.is_json() || column.related_model().is_some() {
            return self.bind_column_value(column, &value.to_json(), params);
        }
        Ok(params.placeholder(value.clone()))
    }
}
