//! INSERT statements.

use super::{CompiledQuery, Compiler, ParamList, Record, Returning, quote_ident};
use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use chrono::Utc;
use std::collections::HashMap;

/// A row's values after defaults are applied.
enum Cell<'r> {
    /// Supplied by the caller.
    Given(&'r serde_json::Value),
    /// Filled in from a default or timestamp.
    Filled(Value),
}

impl Cell<'_> {
    fn is_null(&self) -> bool {
        match self {
            Cell::Given(v) => v.is_null(),
            Cell::Filled(v) => v.is_null(),
        }
    }
}

type Row<'r> = HashMap<&'r str, Cell<'r>>;

/// What to do when an inserted row collides with an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictAction {
    /// `DO NOTHING`
    Ignore,
    /// `DO UPDATE SET col = EXCLUDED.col` for the listed properties, or for
    /// every inserted non-target column when `None`.
    Merge(Option<Vec<String>>),
}

/// `ON CONFLICT` clause for an insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnConflict {
    /// Conflict target properties.
    pub targets: Vec<String>,
    pub action: ConflictAction,
}

impl OnConflict {
    pub fn ignore<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            action: ConflictAction::Ignore,
        }
    }

    pub fn merge<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            action: ConflictAction::Merge(None),
        }
    }

    /// Restrict a merge to the given properties.
    pub fn merge_only<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action = ConflictAction::Merge(Some(properties.into_iter().map(Into::into).collect()));
        self
    }
}

/// Options for [`Compiler::insert`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOptions {
    pub returning: Returning,
    pub on_conflict: Option<OnConflict>,
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(mut self, returning: Returning) -> Self {
        self.returning = returning;
        self
    }

    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = Some(on_conflict);
        self
    }
}

impl Compiler<'_> {
    /// `INSERT INTO "t" (cols) VALUES (...),(...) [ON CONFLICT] [RETURNING]`.
    ///
    /// Defaults and create/update timestamps are filled in first, then every
    /// required column is checked. A column is included when any row carries a
    /// value for it (explicit null included); rows without that value get a
    /// literal `NULL`. Parameters are bound column by column.
    pub fn insert(&self, rows: &[Record], options: &CreateOptions) -> OrmResult<CompiledQuery> {
        if rows.is_empty() {
            return Err(OrmError::InvalidArgument(format!(
                "insert into '{}' requires at least one row",
                self.model.name()
            )));
        }

        let rows = self.prepare_rows(rows)?;

        let columns: Vec<_> = self
            .model
            .columns()
            .iter()
            .filter(|c| !c.is_collection())
            .filter(|c| rows.iter().any(|row| row.contains_key(c.property_name.as_str())))
            .collect();

        let table = self.table();
        if columns.is_empty() {
            if rows.len() > 1 {
                return Err(OrmError::InvalidArgument(format!(
                    "multi-row insert into '{}' has no column values",
                    self.model.name()
                )));
            }
            let mut sql = format!("INSERT INTO {table} DEFAULT VALUES");
            sql.push_str(&self.returning_clause(&options.returning)?);
            return Ok(CompiledQuery::new(sql, ParamList::new()));
        }

        let mut params = ParamList::new();
        let mut cells = vec![Vec::with_capacity(columns.len()); rows.len()];
        for column in &columns {
            for (row, out) in rows.iter().zip(cells.iter_mut()) {
                let cell = match row.get(column.property_name.as_str()) {
                    Some(Cell::Given(value)) => self.bind_column_value(column, value, &mut params)?,
                    Some(Cell::Filled(Value::Null)) | None => "NULL".to_string(),
                    Some(Cell::Filled(value)) => {
                        self.bind_filled_value(column, value, &mut params)?
                    }
                };
                out.push(cell);
            }
        }

        let column_list = columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(",");
        let values = cells
            .iter()
            .map(|row| format!("({})", row.join(",")))
            .collect::<Vec<_>>()
            .join(",");

        let mut sql = format!("INSERT INTO {table} ({column_list}) VALUES {values}");
        if let Some(on_conflict) = &options.on_conflict {
            let inserted: Vec<&str> = columns.iter().map(|c| c.property_name.as_str()).collect();
            sql.push_str(&self.on_conflict_clause(on_conflict, &inserted)?);
        }
        sql.push_str(&self.returning_clause(&options.returning)?);

        #[cfg(feature = "tracing")]
        tracing::trace!(
            target: "pgrepo.compile",
            model = self.model.name(),
            rows = rows.len(),
            params = params.len(),
            "insert"
        );

        Ok(CompiledQuery::new(sql, params))
    }

    /// Apply defaults and timestamps, then validate required columns.
    fn prepare_rows<'r>(&'r self, rows: &'r [Record]) -> OrmResult<Vec<Row<'r>>> {
        let now = Utc::now();
        let mut prepared = Vec::with_capacity(rows.len());

        for record in rows {
            let mut row: Row<'r> = record
                .iter()
                .map(|(k, v)| (k.as_str(), Cell::Given(v)))
                .collect();
            for column in self.model.columns() {
                let property = column.property_name.as_str();
                if row.get(property).is_some_and(|c| !c.is_null()) {
                    continue;
                }
                if let Some(default) = &column.default {
                    row.insert(property, Cell::Filled(default.resolve()));
                } else if column.create_date || column.update_date {
                    row.insert(property, Cell::Filled(Value::Timestamp(now)));
                }
            }

            for column in self.model.columns().iter().filter(|c| c.required) {
                if row.get(column.property_name.as_str()).is_none_or(Cell::is_null) {
                    return Err(OrmError::MissingRequiredField {
                        model: self.model.name().to_string(),
                        property: column.property_name.clone(),
                    });
                }
            }
            prepared.push(row);
        }
        Ok(prepared)
    }

    fn on_conflict_clause(&self, on_conflict: &OnConflict, inserted: &[&str]) -> OrmResult<String> {
        let targets = on_conflict
            .targets
            .iter()
            .map(|p| self.column_name(p).map(quote_ident))
            .collect::<OrmResult<Vec<_>>>()?;
        let target_sql = if targets.is_empty() {
            String::new()
        } else {
            format!(" ({})", targets.join(","))
        };

        let merge = match &on_conflict.action {
            ConflictAction::Ignore => return Ok(format!(" ON CONFLICT{target_sql} DO NOTHING")),
            ConflictAction::Merge(properties) => properties,
        };
        if targets.is_empty() {
            return Err(OrmError::InvalidArgument(
                "ON CONFLICT ... DO UPDATE requires conflict target properties".to_string(),
            ));
        }

        let properties: Vec<&str> = match merge {
            Some(list) => list.iter().map(String::as_str).collect(),
            None => inserted
                .iter()
                .copied()
                .filter(|p| !on_conflict.targets.iter().any(|t| t == p))
                .collect(),
        };
        let mut assignments = Vec::with_capacity(properties.len());
        for property in properties {
            let column = quote_ident(self.column_name(property)?);
            assignments.push(format!("{column}=EXCLUDED.{column}"));
        }

        if assignments.is_empty() {
            return Ok(format!(" ON CONFLICT{target_sql} DO NOTHING"));
        }
        Ok(format!(
            " ON CONFLICT{target_sql} DO UPDATE SET {}",
            assignments.join(",")
        ))
    }
}
