//! # pgrepo
//!
//! A metadata-driven PostgreSQL repository layer.
//!
//! Models are described once with [`ModelMetadata`] and registered in a
//! [`ModelRegistry`]. Caller-supplied where trees, sort specifications and
//! value maps are compiled against that metadata into parameterized SQL
//! (`$1`, `$2`, ...) with an ordered list of bound [`Value`]s.
//!
//! ## Features
//!
//! - **Where trees**: JSON-shaped filters with `or`, `and`, `!`, `like`,
//!   `contains`, `startsWith`, `endsWith` and ordering comparators
//! - **Negation pushdown**: negation reaches the leaves rather than wrapping
//!   fragments in `NOT (...)`; negated `or` groups AND-join negated members
//! - **Array and relation aware**: array columns use `ANY`/`ALL`, related
//!   entity objects collapse to their primary key
//! - **Statement builders**: SELECT, COUNT, INSERT (batch, `ON CONFLICT`),
//!   UPDATE and DELETE with `RETURNING`
//! - **Transaction-friendly**: execute on a client, transaction or pooled
//!   client through [`GenericClient`]
//!
//! ## Example
//!
//! ```ignore
//! use pgrepo::prelude::*;
//! use serde_json::json;
//!
//! let mut registry = ModelRegistry::new();
//! registry.register(ModelMetadata::new(
//!     "Product",
//!     "products",
//!     vec![
//!         Column::new("id", ColumnType::Integer).primary(),
//!         Column::new("name", ColumnType::String).required(),
//!         Column::new("tags", ColumnType::StringArray),
//!     ],
//! )?);
//!
//! let products = Repository::new(std::sync::Arc::new(registry), "Product")?;
//! let query = products.find_query(
//!     &FindArgs::new()
//!         .filter(json!({ "name": { "contains": "bar" }, "tags": "sale" }))
//!         .sort("name desc")
//!         .limit(10),
//! )?;
//! assert_eq!(
//!     query.sql,
//!     r#"SELECT "id","name","tags" FROM "products" WHERE "name" ILIKE $1 AND $2=ANY("tags") ORDER BY "name" DESC LIMIT 10"#
//! );
//! ```

pub mod client;
pub mod compile;
pub mod config;
pub mod error;
pub mod filter;
pub mod metadata;
pub mod prelude;
pub mod repository;
pub mod row;
pub mod value;

pub use client::GenericClient;
pub use compile::{
    CompiledQuery, Compiler, ConflictAction, CreateOptions, DestroyOptions, FindArgs, Numeric,
    OnConflict, ParamList, Record, Returning, Sort, UpdateOptions,
};
pub use config::{DatabaseConfig, RepositoryConfig};
pub use error::{OrmError, OrmResult};
pub use filter::{Comparator, Where, WhereExpr, WhereKey};
pub use metadata::{Column, ColumnKind, ColumnType, DefaultValue, ModelMetadata, ModelRegistry};
pub use repository::Repository;
pub use row::{FromRow, RowExt};
pub use value::Value;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config};
