//! SELECT and COUNT statements.

use super::{CompiledQuery, Compiler, ParamList, Sort};
use crate::error::{OrmError, OrmResult};
use crate::filter::Where;
use serde::Deserialize;

/// A limit/skip value as supplied by callers.
///
/// Query-string style inputs often arrive as text, so numeric strings are
/// accepted alongside numbers. Fractions are truncated.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Numeric {
    /// Resolve to a non-negative row count.
    pub fn to_count(&self, what: &str) -> OrmResult<u64> {
        let invalid = || OrmError::InvalidArgument(format!("{what} must be a non-negative number"));
        let n = match self {
            Numeric::Int(n) => return u64::try_from(*n).map_err(|_| invalid()),
            Numeric::Float(f) => *f,
            Numeric::Text(s) => s.trim().parse::<f64>().map_err(|_| invalid())?,
        };
        if !n.is_finite() || n < 0.0 {
            return Err(invalid());
        }
        Ok(n.trunc() as u64)
    }
}

impl From<i64> for Numeric {
    fn from(value: i64) -> Self {
        Numeric::Int(value)
    }
}

impl From<i32> for Numeric {
    fn from(value: i32) -> Self {
        Numeric::Int(value.into())
    }
}

impl From<u32> for Numeric {
    fn from(value: u32) -> Self {
        Numeric::Int(value.into())
    }
}

impl From<f64> for Numeric {
    fn from(value: f64) -> Self {
        Numeric::Float(value)
    }
}

impl From<&str> for Numeric {
    fn from(value: &str) -> Self {
        Numeric::Text(value.to_string())
    }
}

impl From<String> for Numeric {
    fn from(value: String) -> Self {
        Numeric::Text(value)
    }
}

/// Arguments for a find query.
///
/// Deserializes from the usual request shape:
/// `{"select": [...], "where": {...}, "sort": "name desc", "skip": 20, "limit": 10}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FindArgs {
    pub select: Option<Vec<String>>,
    #[serde(rename = "where")]
    pub filter: Where,
    #[serde(deserialize_with = "one_or_many")]
    pub sort: Vec<Sort>,
    pub skip: Option<Numeric>,
    pub limit: Option<Numeric>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Sort>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<Sort>),
        One(Sort),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::Many(sorts)) => sorts,
        Some(OneOrMany::One(sort)) => vec![sort],
        None => Vec::new(),
    })
}

impl FindArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(properties.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, filter: Where) -> Self {
        self.filter = filter;
        self
    }

    /// Append a sort specification. Specifications apply in call order.
    pub fn sort(mut self, sort: impl Into<Sort>) -> Self {
        self.sort.push(sort.into());
        self
    }

    pub fn skip(mut self, skip: impl Into<Numeric>) -> Self {
        self.skip = Some(skip.into());
        self
    }

    pub fn limit(mut self, limit: impl Into<Numeric>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    /// Page-based pagination (1-based pages).
    pub fn paginate(mut self, page: u64, page_size: u64) -> Self {
        let page = page.max(1);
        self.skip = Some(Numeric::Int(
            i64::try_from((page - 1).saturating_mul(page_size)).unwrap_or(i64::MAX),
        ));
        self.limit = Some(Numeric::Int(i64::try_from(page_size).unwrap_or(i64::MAX)));
        self
    }
}

impl Compiler<'_> {
    /// `SELECT <cols> FROM "t" [WHERE] [ORDER BY] [LIMIT] [OFFSET]`.
    pub fn select(&self, args: &FindArgs) -> OrmResult<CompiledQuery> {
        let mut params = ParamList::new();
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.columns_to_select(args.select.as_deref())?,
            self.table()
        );

        let where_sql = self.build_where_statement(&args.filter, &mut params)?;
        if !where_sql.is_empty() {
            sql.push(' ');
            sql.push_str(&where_sql);
        }

        let order = self.order_statement(&args.sort)?;
        if !order.is_empty() {
            sql.push(' ');
            sql.push_str(&order);
        }

        if let Some(limit) = &args.limit {
            let limit = limit.to_count("limit")?;
            if limit > 0 {
                sql.push_str(&format!(" LIMIT {limit}"));
            }
        }
        if let Some(skip) = &args.skip {
            let skip = skip.to_count("skip")?;
            if skip > 0 {
                sql.push_str(&format!(" OFFSET {skip}"));
            }
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(target: "pgrepo.compile", model = self.model.name(), sql = %sql, "select");

        Ok(CompiledQuery::new(sql, params))
    }

    /// `SELECT count(*) AS "count" FROM "t" [WHERE]`.
    pub fn count(&self, filter: &Where) -> OrmResult<CompiledQuery> {
        let mut params = ParamList::new();
        let mut sql = format!("SELECT count(*) AS \"count\" FROM {}", self.table());

        let where_sql = self.build_where_statement(filter, &mut params)?;
        if !where_sql.is_empty() {
            sql.push(' ');
            sql.push_str(&where_sql);
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(target: "pgrepo.compile", model = self.model.name(), sql = %sql, "count");

        Ok(CompiledQuery::new(sql, params))
    }
}
