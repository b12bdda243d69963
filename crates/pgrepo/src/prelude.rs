//! Convenient imports for typical `pgrepo` usage.
//!
//! ```ignore
//! use pgrepo::prelude::*;
//! ```

pub use crate::{
    Column, ColumnType, CompiledQuery, CreateOptions, DestroyOptions, FindArgs, FromRow,
    GenericClient, ModelMetadata, ModelRegistry, OnConflict, OrmError, OrmResult, Record,
    Repository, RepositoryConfig, Returning, RowExt, UpdateOptions, Value, Where,
};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};
