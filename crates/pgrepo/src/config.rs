//! Runtime configuration.

use std::time::Duration;

/// Execution settings for a [`Repository`](crate::Repository).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Query timeout. `None` means no timeout (default).
    pub query_timeout: Option<Duration>,
    /// Emit each executed statement on the `pgrepo.sql` tracing target.
    pub log_sql: bool,
    /// Truncate logged SQL to this many bytes. `None` logs it whole.
    pub max_logged_sql_length: Option<usize>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            query_timeout: None,
            log_sql: true,
            max_logged_sql_length: Some(200),
        }
    }
}

impl RepositoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query timeout duration.
    ///
    /// Queries exceeding it are cancelled on the server (best effort) and fail
    /// with [`OrmError::Timeout`](crate::OrmError::Timeout).
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn with_sql_logging(mut self, enabled: bool) -> Self {
        self.log_sql = enabled;
        self
    }

    pub fn with_max_logged_sql_length(mut self, len: usize) -> Self {
        self.max_logged_sql_length = Some(len);
        self
    }

    /// Log statements without truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_logged_sql_length = None;
        self
    }
}

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_pool_size: usize,
}

impl DatabaseConfig {
    pub const DEFAULT_MAX_POOL_SIZE: usize = 16;

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_pool_size: Self::DEFAULT_MAX_POOL_SIZE,
        }
    }

    pub fn with_max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size;
        self
    }

    /// Read `DATABASE_URL` and the optional `PGREPO_MAX_POOL_SIZE`.
    ///
    /// Returns `None` when `DATABASE_URL` is unset. An unparsable pool size
    /// falls back to the default.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let config = Self::new(url);
        Some(
            match std::env::var("PGREPO_MAX_POOL_SIZE")
                .ok()
                .and_then(|v| v.trim().parse().ok())
            {
                Some(size) => config.with_max_pool_size(size),
                None => config,
            },
        )
    }
}
