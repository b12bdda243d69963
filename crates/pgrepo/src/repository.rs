//! Model-bound repository.
//!
//! A [`Repository`] pairs one model with the registry it was declared in and
//! exposes two layers:
//!
//! - `*_query` methods that only compile, returning a [`CompiledQuery`];
//! - async executors that compile, log, run the statement on any
//!   [`GenericClient`] and map the resulting rows with [`FromRow`].
//!
//! ```ignore
//! let products = Repository::new(registry.clone(), "Product")?;
//! let rows: Vec<Record> = products
//!     .find(&client, &FindArgs::new().filter(json!({"store": 12})).sort("name"))
//!     .await?;
//! ```

use crate::client::GenericClient;
use crate::compile::{
    CompiledQuery, Compiler, CreateOptions, DestroyOptions, FindArgs, Numeric, Record,
    UpdateOptions,
};
use crate::config::RepositoryConfig;
use crate::error::{OrmError, OrmResult};
use crate::filter::Where;
use crate::metadata::{ModelMetadata, ModelRegistry};
use crate::row::{FromRow, RowExt};
use std::future::Future;
use std::sync::Arc;

/// Statement kind, used as a logging field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementKind {
    Select,
    Count,
    Insert,
    Update,
    Delete,
}

/// Truncate to at most `max_bytes`, respecting char boundaries.
#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
fn truncate_sql(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Compiles and executes statements for one model.
#[derive(Debug, Clone)]
pub struct Repository {
    model: Arc<ModelMetadata>,
    registry: Arc<ModelRegistry>,
    config: RepositoryConfig,
}

impl Repository {
    /// Bind a repository to a registered model.
    pub fn new(registry: Arc<ModelRegistry>, model_name: &str) -> OrmResult<Self> {
        let model = registry.get(model_name).cloned().ok_or_else(|| {
            OrmError::validation(format!("Model '{model_name}' is not registered"))
        })?;
        Ok(Self {
            model,
            registry,
            config: RepositoryConfig::default(),
        })
    }

    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn model(&self) -> &ModelMetadata {
        &self.model
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn compiler(&self) -> Compiler<'_> {
        Compiler::new(&self.model, &self.registry)
    }

    // ==================== compile only ====================

    pub fn find_query(&self, args: &FindArgs) -> OrmResult<CompiledQuery> {
        self.compiler().select(args)
    }

    /// Same as [`find_query`](Self::find_query) with the limit forced to 1.
    pub fn find_one_query(&self, args: &FindArgs) -> OrmResult<CompiledQuery> {
        let mut args = args.clone();
        args.limit = Some(Numeric::Int(1));
        self.compiler().select(&args)
    }

    pub fn count_query(&self, filter: &Where) -> OrmResult<CompiledQuery> {
        self.compiler().count(filter)
    }

    pub fn create_query(
        &self,
        values: &Record,
        options: &CreateOptions,
    ) -> OrmResult<CompiledQuery> {
        self.compiler().insert(std::slice::from_ref(values), options)
    }

    pub fn create_many_query(
        &self,
        rows: &[Record],
        options: &CreateOptions,
    ) -> OrmResult<CompiledQuery> {
        self.compiler().insert(rows, options)
    }

    pub fn update_query(
        &self,
        filter: &Where,
        values: &Record,
        options: &UpdateOptions,
    ) -> OrmResult<CompiledQuery> {
        self.compiler().update(filter, values, options)
    }

    pub fn destroy_query(
        &self,
        filter: &Where,
        options: &DestroyOptions,
    ) -> OrmResult<CompiledQuery> {
        self.compiler().delete(filter, options)
    }

    // ==================== execute ====================

    /// Fetch every row matching `args`.
    pub async fn find<T, C>(&self, client: &C, args: &FindArgs) -> OrmResult<Vec<T>>
    where
        T: FromRow,
        C: GenericClient,
    {
        let query = self.find_query(args)?;
        self.fetch_all(client, StatementKind::Select, &query).await
    }

    /// Fetch the first row matching `args`, if any.
    pub async fn find_one<T, C>(&self, client: &C, args: &FindArgs) -> OrmResult<Option<T>>
    where
        T: FromRow,
        C: GenericClient,
    {
        let query = self.find_one_query(args)?;
        self.log(StatementKind::Select, &query);
        let row = self
            .run(client, client.query_opt(&query.sql, &query.params_ref()))
            .await?;
        row.as_ref().map(T::from_row).transpose()
    }

    pub async fn count<C: GenericClient>(&self, client: &C, filter: &Where) -> OrmResult<i64> {
        let query = self.count_query(filter)?;
        self.log(StatementKind::Count, &query);
        let row = self
            .run(client, client.query_opt(&query.sql, &query.params_ref()))
            .await?
            .ok_or_else(|| OrmError::not_found("count returned no row"))?;
        row.try_get_column("count")
    }

    /// Insert one entity and return the row reported by `RETURNING`.
    ///
    /// Fails with [`OrmError::NotFound`] when no row comes back, which happens
    /// with `Returning::None` or when an `ON CONFLICT DO NOTHING` skipped it.
    pub async fn create<T, C>(
        &self,
        client: &C,
        values: &Record,
        options: &CreateOptions,
    ) -> OrmResult<T>
    where
        T: FromRow,
        C: GenericClient,
    {
        let query = self.create_query(values, options)?;
        let rows: Vec<T> = self.fetch_all(client, StatementKind::Insert, &query).await?;
        rows.into_iter().next().ok_or_else(|| {
            OrmError::not_found(format!("insert into '{}' returned no row", self.model.name()))
        })
    }

    /// Insert a batch in one statement.
    pub async fn create_many<T, C>(
        &self,
        client: &C,
        rows: &[Record],
        options: &CreateOptions,
    ) -> OrmResult<Vec<T>>
    where
        T: FromRow,
        C: GenericClient,
    {
        let query = self.create_many_query(rows, options)?;
        self.fetch_all(client, StatementKind::Insert, &query).await
    }

    /// Update matching rows and return what `RETURNING` reports (empty with
    /// `Returning::None`).
    pub async fn update<T, C>(
        &self,
        client: &C,
        filter: &Where,
        values: &Record,
        options: &UpdateOptions,
    ) -> OrmResult<Vec<T>>
    where
        T: FromRow,
        C: GenericClient,
    {
        let query = self.update_query(filter, values, options)?;
        self.fetch_all(client, StatementKind::Update, &query).await
    }

    /// Delete matching rows and return the affected row count.
    pub async fn destroy<C: GenericClient>(&self, client: &C, filter: &Where) -> OrmResult<u64> {
        let query = self.destroy_query(filter, &DestroyOptions::default())?;
        self.log(StatementKind::Delete, &query);
        self.run(client, client.execute(&query.sql, &query.params_ref()))
            .await
    }

    /// Delete matching rows and return what `RETURNING` reports.
    pub async fn destroy_returning<T, C>(
        &self,
        client: &C,
        filter: &Where,
        options: &DestroyOptions,
    ) -> OrmResult<Vec<T>>
    where
        T: FromRow,
        C: GenericClient,
    {
        let query = self.destroy_query(filter, options)?;
        self.fetch_all(client, StatementKind::Delete, &query).await
    }

    async fn fetch_all<T, C>(
        &self,
        client: &C,
        kind: StatementKind,
        query: &CompiledQuery,
    ) -> OrmResult<Vec<T>>
    where
        T: FromRow,
        C: GenericClient,
    {
        self.log(kind, query);
        let rows = self
            .run(client, client.query(&query.sql, &query.params_ref()))
            .await?;
        rows.iter().map(T::from_row).collect()
    }

    /// Await `future`, enforcing the configured timeout.
    ///
    /// On timeout the server-side query is cancelled in the background (best
    /// effort) and [`OrmError::Timeout`] is returned.
    async fn run<T, C, F>(&self, client: &C, future: F) -> OrmResult<T>
    where
        C: GenericClient,
        F: Future<Output = OrmResult<T>>,
    {
        let Some(timeout) = self.config.query_timeout else {
            return future.await;
        };
        match tokio::time::timeout(timeout, future).await {
            Ok(result) => result,
            Err(_) => {
                if let Some(token) = client.cancel_token() {
                    tokio::spawn(async move {
                        let _ = token.cancel_query(tokio_postgres::NoTls).await;
                    });
                }
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    target: "pgrepo.sql",
                    model = self.model.name(),
                    timeout = ?timeout,
                    "query timed out"
                );
                Err(OrmError::Timeout(timeout))
            }
        }
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn log(&self, kind: StatementKind, query: &CompiledQuery) {
        if !self.config.log_sql {
            return;
        }
        #[cfg(feature = "tracing")]
        {
            let sql = match self.config.max_logged_sql_length {
                Some(max) if query.sql.len() > max => {
                    format!("{}...", truncate_sql(&query.sql, max))
                }
                _ => query.sql.clone(),
            };
            tracing::debug!(
                target: "pgrepo.sql",
                model = self.model.name(),
                kind = ?kind,
                param_count = query.params.len(),
                sql = %sql,
            );
        }
    }
}
