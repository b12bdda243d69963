//! UPDATE statements.

use super::{CompiledQuery, Compiler, ParamList, Record, Returning, quote_ident};
use crate::error::{OrmError, OrmResult};
use crate::filter::Where;
use crate::value::Value;
use chrono::Utc;

/// Options for [`Compiler::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOptions {
    pub returning: Returning,
    /// Set update-date columns the caller left empty to the current time.
    pub stamp_update_date: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            returning: Returning::All,
            stamp_update_date: true,
        }
    }
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(mut self, returning: Returning) -> Self {
        self.returning = returning;
        self
    }

    pub fn stamp_update_date(mut self, stamp: bool) -> Self {
        self.stamp_update_date = stamp;
        self
    }
}

impl Compiler<'_> {
    /// `UPDATE "t" SET "a"=$1,... [WHERE] [RETURNING]`.
    ///
    /// Properties the model does not declare, and collection properties, are
    /// skipped. SET placeholders are numbered before WHERE placeholders.
    pub fn update(
        &self,
        filter: &Where,
        values: &Record,
        options: &UpdateOptions,
    ) -> OrmResult<CompiledQuery> {
        let mut params = ParamList::new();
        let mut assignments = Vec::with_capacity(values.len());

        for (property, value) in values {
            let Some(column) = self.model.column(property) else {
                continue;
            };
            if column.is_collection() {
                continue;
            }
            if options.stamp_update_date && column.update_date && value.is_null() {
                continue;
            }
            let bound = self.bind_column_value(column, value, &mut params)?;
            assignments.push(format!("{}={bound}", quote_ident(&column.name)));
        }

        if options.stamp_update_date {
            let now = Utc::now();
            for column in self.model.update_date_columns() {
                let supplied = values
                    .get(&column.property_name)
                    .is_some_and(|v| !v.is_null());
                if supplied {
                    continue;
                }
                let placeholder = params.placeholder(Value::Timestamp(now));
                assignments.push(format!("{}={placeholder}", quote_ident(&column.name)));
            }
        }

        if assignments.is_empty() {
            return Err(OrmError::InvalidArgument(format!(
                "update of '{}' has no values to set",
                self.model.name()
            )));
        }

        let mut sql = format!("UPDATE {} SET {}", self.table(), assignments.join(","));
        let where_sql = self.build_where_statement(filter, &mut params)?;
        if !where_sql.is_empty() {
            sql.push(' ');
            sql.push_str(&where_sql);
        }
        sql.push_str(&self.returning_clause(&options.returning)?);

        #[cfg(feature = "tracing")]
        tracing::trace!(target: "pgrepo.compile", model = self.model.name(), sql = %sql, "update");

        Ok(CompiledQuery::new(sql, params))
    }
}
