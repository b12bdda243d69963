//! Where-expression compiler.
//!
//! Compiles a [`WhereExpr`] tree into a boolean SQL fragment, appending bound
//! values to the statement's [`ParamList`] as it goes.
//!
//! Negation is threaded down to the leaves rather than wrapped around a
//! fragment with `NOT (...)`: negated comparisons invert their operator
//! (`=` → `<>`, `=ANY` → `<>ALL`, `<` → `>=`), negated `or` groups join their
//! negated members with `AND`. Nested objects and `and` arrays always
//! AND-join their members, negated or not.

use super::columns::quote_ident;
use super::{Compiler, ParamList};
use crate::error::{OrmError, OrmResult};
use crate::filter::{Comparator, Where, WhereExpr, WhereKey};
use crate::metadata::Column;
use crate::value::Value;

const ALWAYS_TRUE: &str = "1=1";
const ALWAYS_FALSE: &str = "1<>1";

fn tautology(negated: bool) -> String {
    if negated { ALWAYS_TRUE } else { ALWAYS_FALSE }.to_string()
}

/// Combine the terms of an OR group (`AND` when negated).
fn join_any(mut terms: Vec<String>, negated: bool) -> String {
    if terms.len() == 1 {
        return terms.remove(0);
    }
    if negated {
        terms.join(" AND ")
    } else {
        format!("({})", terms.join(" OR "))
    }
}

impl Compiler<'_> {
    /// `WHERE ...` for a caller-supplied filter, or an empty string when the
    /// filter has no constraints.
    pub fn build_where_statement(
        &self,
        filter: &Where,
        params: &mut ParamList,
    ) -> OrmResult<String> {
        let expr = match filter {
            serde_json::Value::Null => return Ok(String::new()),
            serde_json::Value::Object(_) => WhereExpr::from(filter),
            other => {
                return Err(OrmError::InvalidConstraint(format!(
                    "where clause must be an object, got {other}"
                )));
            }
        };

        let fragment = self.build_where(&expr, params)?;
        if fragment.is_empty() {
            Ok(fragment)
        } else {
            Ok(format!("WHERE {fragment}"))
        }
    }

    /// Compile a where tree into a boolean fragment (without `WHERE`).
    pub fn build_where(&self, expr: &WhereExpr, params: &mut ParamList) -> OrmResult<String> {
        self.compile(Some(Comparator::And), None, expr, false, params)
    }

    fn compile(
        &self,
        comparator: Option<Comparator>,
        property: Option<&str>,
        value: &WhereExpr,
        negated: bool,
        params: &mut ParamList,
    ) -> OrmResult<String> {
        match comparator {
            Some(Comparator::Not) => self.compile(None, property, value, !negated, params),
            Some(Comparator::Or) => self.compile_or(property, value, negated, params),
            Some(Comparator::And) => match value {
                WhereExpr::Array(items) => self.compile_and(property, items, negated, params),
                _ => self.compile(None, property, value, negated, params),
            },
            Some(c @ (Comparator::Contains | Comparator::StartsWith | Comparator::EndsWith)) => {
                let pattern = wildcard(c, value)?;
                self.compile_like(property, &pattern, negated, params)
            }
            Some(Comparator::Like) => self.compile_like(property, value, negated, params),
            Some(c @ (Comparator::Lt | Comparator::Lte | Comparator::Gt | Comparator::Gte)) => {
                self.compile_ordering(c, property, value, negated, params)
            }
            None => self.compile_value(property, value, negated, params),
        }
    }

    fn compile_or(
        &self,
        property: Option<&str>,
        value: &WhereExpr,
        negated: bool,
        params: &mut ParamList,
    ) -> OrmResult<String> {
        let WhereExpr::Array(items) = value else {
            return Err(OrmError::InvalidConstraint(
                "\"or\" expects an array of constraints".to_string(),
            ));
        };
        if items.is_empty() {
            return Ok(tautology(negated));
        }

        let mut clauses = Vec::with_capacity(items.len());
        for item in items {
            let clause = self.compile(None, property, item, negated, params)?;
            if !clause.is_empty() {
                clauses.push(clause);
            }
        }
        if clauses.is_empty() {
            return Ok(String::new());
        }
        Ok(join_any(clauses, negated))
    }

    fn compile_and(
        &self,
        property: Option<&str>,
        items: &[WhereExpr],
        negated: bool,
        params: &mut ParamList,
    ) -> OrmResult<String> {
        let mut clauses = Vec::with_capacity(items.len());
        for item in items {
            let clause = self.compile(None, property, item, negated, params)?;
            if !clause.is_empty() {
                clauses.push(clause);
            }
        }
        // Negated members stay AND-joined, like the keys of a negated object.
        Ok(clauses.join(" AND "))
    }

    fn require_property<'p>(
        &self,
        property: Option<&'p str>,
        comparator: &str,
    ) -> OrmResult<(&'p str, &Column)> {
        let property = property.ok_or_else(|| {
            OrmError::InvalidConstraint(format!(
                "\"{comparator}\" must be applied to a property of {}",
                self.model.name()
            ))
        })?;
        let column = self.model.require_column(property)?;
        if column.is_collection() {
            return Err(OrmError::InvalidConstraint(format!(
                "collection property {}.{} cannot be used in a where clause",
                self.model.name(),
                property
            )));
        }
        Ok((property, column))
    }

    /// Resolve a hydrated related-entity object to its primary key value.
    ///
    /// Returns `None` when the value should be compiled as written: the column is
    /// not a relation, the value is not an object, or the object is a nested
    /// constraint (it carries comparator keys).
    fn dereference<'v>(
        &self,
        column: &Column,
        value: &'v WhereExpr,
    ) -> OrmResult<Option<&'v WhereExpr>> {
        if column.related_model().is_none() || !matches!(value, WhereExpr::Node(_)) {
            return Ok(None);
        }
        let related = self.registry.require_related(self.model, column)?;
        let pk = related.primary_key().map(|c| c.property_name.as_str());

        match pk.and_then(|pk| value.property(pk)) {
            Some(WhereExpr::Null) | None if !value.has_comparator() => {
                Err(OrmError::UndefinedValue(format!(
                    "value for {}.{} is missing primary key '{}'",
                    self.model.name(),
                    column.property_name,
                    pk.unwrap_or("id")
                )))
            }
            Some(WhereExpr::Null) | None => Ok(None),
            Some(pk_value) => Ok(Some(pk_value)),
        }
    }

    fn compile_value(
        &self,
        property: Option<&str>,
        value: &WhereExpr,
        negated: bool,
        params: &mut ParamList,
    ) -> OrmResult<String> {
        if property.is_some() {
            let (property, column) = self.require_property(property, "=")?;
            if let Some(pk_value) = self.dereference(column, value)? {
                return self.compile_value(Some(property), pk_value, negated, params);
            }
        }

        match value {
            WhereExpr::Node(entries) => {
                let mut clauses = Vec::with_capacity(entries.len());
                for (key, sub) in entries {
                    let clause = match key {
                        WhereKey::Comparator(c) => {
                            self.compile(Some(*c), property, sub, negated, params)?
                        }
                        WhereKey::Property(p) => self.compile(None, Some(p), sub, negated, params)?,
                    };
                    if !clause.is_empty() {
                        clauses.push(clause);
                    }
                }
                Ok(clauses.join(" AND "))
            }
            WhereExpr::Array(items) => {
                let (_, column) = self.require_property(property, "in")?;
                self.compile_array(column, items, negated, params)
            }
            WhereExpr::Null => {
                let (_, column) = self.require_property(property, "=")?;
                Ok(null_check(column, negated))
            }
            WhereExpr::Scalar(v) => {
                let (_, column) = self.require_property(property, "=")?;
                Ok(self.compare(column, None, v, negated, params))
            }
        }
    }

    fn compile_array(
        &self,
        column: &Column,
        items: &[WhereExpr],
        negated: bool,
        params: &mut ParamList,
    ) -> OrmResult<String> {
        let col = quote_ident(&column.name);
        if items.is_empty() {
            if column.is_array() {
                let op = if negated { "<>" } else { "=" };
                return Ok(format!("{col}{op}'{{}}'"));
            }
            return Ok(tautology(negated));
        }

        let mut terms = Vec::new();
        let mut values = Vec::new();
        for item in items {
            let item = self.dereference(column, item)?.unwrap_or(item);
            match item {
                WhereExpr::Null => terms.push(null_check(column, negated)),
                WhereExpr::Scalar(v) => values.push(v.clone()),
                WhereExpr::Array(_) | WhereExpr::Node(_) => {
                    return Err(OrmError::InvalidConstraint(format!(
                        "array constraint for {}.{} may only contain scalar values",
                        self.model.name(),
                        column.property_name
                    )));
                }
            }
        }

        if values.len() == 1 || (column.is_array() && !values.is_empty()) {
            // Membership in an array column is tested per element.
            for v in &values {
                terms.push(self.compare(column, None, v, negated, params));
            }
        } else if !values.is_empty() {
            let cast = self.array_cast(column)?;
            let idx = params.push(Value::Array(values));
            let op = if negated { "<>ALL" } else { "=ANY" };
            terms.push(format!("{col}{op}(${idx}{cast})"));
        }

        Ok(join_any(terms, negated))
    }

    fn array_cast(&self, column: &Column) -> OrmResult<&'static str> {
        if let Some(t) = column.column_type() {
            return Ok(t.array_cast());
        }
        let related = self.registry.require_related(self.model, column)?;
        Ok(related
            .primary_key()
            .and_then(Column::column_type)
            .map_or("::TEXT[]", |t| t.array_cast()))
    }

    fn compile_ordering(
        &self,
        comparator: Comparator,
        property: Option<&str>,
        value: &WhereExpr,
        negated: bool,
        params: &mut ParamList,
    ) -> OrmResult<String> {
        let (property, column) = self.require_property(property, comparator.as_str())?;
        if column.is_array() || column.is_json() {
            return Err(OrmError::UnsupportedOperator {
                operator: comparator.to_string(),
                property: property.to_string(),
            });
        }
        let value = self.dereference(column, value)?.unwrap_or(value);
        match value {
            WhereExpr::Null => Ok(null_check(column, negated)),
            WhereExpr::Scalar(v) => Ok(self.compare(column, Some(comparator), v, negated, params)),
            _ => Err(OrmError::InvalidConstraint(format!(
                "\"{comparator}\" on {}.{} expects a single value",
                self.model.name(),
                property
            ))),
        }
    }

    /// A single bound comparison.
    fn compare(
        &self,
        column: &Column,
        comparator: Option<Comparator>,
        value: &Value,
        negated: bool,
        params: &mut ParamList,
    ) -> String {
        let col = quote_ident(&column.name);
        let idx = params.push(value.clone());
        if let Some(op) = comparator.and_then(|c| c.ordering_operator(negated)) {
            return format!("{col}{op}${idx}");
        }
        if column.is_array() {
            let op = if negated { "<>ALL" } else { "=ANY" };
            return format!("${idx}{op}({col})");
        }
        let op = if negated { "<>" } else { "=" };
        format!("{col}{op}${idx}")
    }

    fn compile_like(
        &self,
        property: Option<&str>,
        value: &WhereExpr,
        negated: bool,
        params: &mut ParamList,
    ) -> OrmResult<String> {
        let (property, column) = self.require_property(property, "like")?;
        let col = quote_ident(&column.name);

        match value {
            WhereExpr::Array(items) => match items.len() {
                0 => Ok(tautology(negated)),
                1 => self.compile_like(Some(property), &items[0], negated, params),
                _ => {
                    let mut lowered = Vec::with_capacity(items.len());
                    for item in items {
                        let s = item.as_str().ok_or_else(|| like_error(property))?;
                        lowered.push(Value::Text(s.to_lowercase()));
                    }
                    let idx = params.push(Value::Array(lowered));
                    let op = if negated { "<>ALL" } else { "=ANY" };
                    if column.is_array() {
                        let unnested = quote_ident(&format!("unnested_{}", column.name));
                        return Ok(format!(
                            "EXISTS(SELECT 1 FROM (SELECT unnest({col}) AS {unnested}) __unnested WHERE lower({unnested}){op}(${idx}::TEXT[]))"
                        ));
                    }
                    Ok(format!("lower({col}){op}(${idx}::TEXT[])"))
                }
            },
            WhereExpr::Scalar(Value::Text(s)) if s.is_empty() => {
                if column.is_array() {
                    let op = if negated { "<>ALL" } else { "=ANY" };
                    return Ok(format!("''{op}({col})"));
                }
                let op = if negated { "!=" } else { "=" };
                Ok(format!("{col}{op}''"))
            }
            WhereExpr::Scalar(Value::Text(s)) => {
                let idx = params.push(s.as_str());
                if column.is_array() {
                    let unnested = quote_ident(&format!("unnested_{}", column.name));
                    return Ok(format!(
                        "{not}EXISTS(SELECT 1 FROM (SELECT unnest({col}) AS {unnested}) __unnested WHERE {unnested} ILIKE ${idx})",
                        not = if negated { "NOT " } else { "" },
                    ));
                }
                if negated {
                    Ok(format!("{col} NOT ILIKE ${idx}"))
                } else {
                    Ok(format!("{col} ILIKE ${idx}"))
                }
            }
            _ => Err(like_error(property)),
        }
    }
}

fn like_error(property: &str) -> OrmError {
    OrmError::InvalidConstraint(format!(
        "pattern constraint on '{property}' expects a string or an array of strings"
    ))
}

fn null_check(column: &Column, negated: bool) -> String {
    let col = quote_ident(&column.name);
    if negated {
        format!("{col} IS NOT NULL")
    } else {
        format!("{col} IS NULL")
    }
}

/// Rewrite a `contains`/`startsWith`/`endsWith` value into a `like` pattern.
fn wildcard(comparator: Comparator, value: &WhereExpr) -> OrmResult<WhereExpr> {
    let wrap = |s: &str| match comparator {
        Comparator::StartsWith => format!("{s}%"),
        Comparator::EndsWith => format!("%{s}"),
        _ => format!("%{s}%"),
    };
    let invalid = || {
        OrmError::InvalidConstraint(format!(
            "\"{comparator}\" expects a string or an array of strings"
        ))
    };

    match value {
        WhereExpr::Scalar(Value::Text(s)) => Ok(WhereExpr::Scalar(Value::Text(wrap(s)))),
        WhereExpr::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(|s| WhereExpr::Scalar(Value::Text(wrap(s))))
                    .ok_or_else(invalid)
            })
            .collect::<OrmResult<Vec<_>>>()
            .map(WhereExpr::Array),
        _ => Err(invalid()),
    }
}
