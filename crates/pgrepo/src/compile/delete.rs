//! DELETE statements.

use super::{CompiledQuery, Compiler, ParamList, Returning};
use crate::error::OrmResult;
use crate::filter::Where;

/// Options for [`Compiler::delete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestroyOptions {
    /// Defaults to [`Returning::None`].
    pub returning: Returning,
}

impl Default for DestroyOptions {
    fn default() -> Self {
        Self {
            returning: Returning::None,
        }
    }
}

impl DestroyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(mut self, returning: Returning) -> Self {
        self.returning = returning;
        self
    }
}

impl Compiler<'_> {
    /// `DELETE FROM "t" [WHERE] [RETURNING]`.
    ///
    /// An empty filter deletes every row.
    pub fn delete(&self, filter: &Where, options: &DestroyOptions) -> OrmResult<CompiledQuery> {
        let mut params = ParamList::new();
        let mut sql = format!("DELETE FROM {}", self.table());

        let where_sql = self.build_where_statement(filter, &mut params)?;
        if !where_sql.is_empty() {
            sql.push(' ');
            sql.push_str(&where_sql);
        }
        sql.push_str(&self.returning_clause(&options.returning)?);

        #[cfg(feature = "tracing")]
        tracing::trace!(target: "pgrepo.compile", model = self.model.name(), sql = %sql, "delete");

        Ok(CompiledQuery::new(sql, params))
    }
}
