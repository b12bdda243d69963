//! Property → column resolution, projections and ORDER BY.

use super::Compiler;
use crate::error::OrmResult;
use serde::Deserialize;

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// One sort specification.
///
/// - `Text("name, createdAt desc")`: comma-separated `property[ asc|desc]` tokens.
/// - `Keyed({"name": 1, "createdAt": -1})`: property → direction. `-1`, `"-1"`
///   and anything containing "desc" (any case) sort descending.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Sort {
    Text(String),
    Keyed(serde_json::Map<String, serde_json::Value>),
}

impl From<&str> for Sort {
    fn from(value: &str) -> Self {
        Sort::Text(value.to_string())
    }
}

impl From<String> for Sort {
    fn from(value: String) -> Self {
        Sort::Text(value)
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Sort {
    fn from(value: serde_json::Map<String, serde_json::Value>) -> Self {
        Sort::Keyed(value)
    }
}

fn is_descending(direction: &serde_json::Value) -> bool {
    match direction {
        serde_json::Value::Number(n) => n.as_f64() == Some(-1.0),
        serde_json::Value::String(s) => is_descending_text(s),
        _ => false,
    }
}

fn is_descending_text(direction: &str) -> bool {
    direction.trim() == "-1" || direction.to_ascii_lowercase().contains("desc")
}

impl Compiler<'_> {
    /// Physical column name for a property.
    pub fn column_name(&self, property_name: &str) -> OrmResult<&str> {
        Ok(&self.model.require_column(property_name)?.name)
    }

    /// Projection list for SELECT and RETURNING.
    ///
    /// Without `select`, every non-collection column is projected. With an
    /// explicit list, the primary key is appended when missing. Columns whose
    /// physical name differs from the property are aliased back to the property.
    pub fn columns_to_select(&self, select: Option<&[String]>) -> OrmResult<String> {
        let mut properties: Vec<&str> = match select {
            Some(select) => select.iter().map(String::as_str).collect(),
            None => self
                .model
                .columns()
                .iter()
                .filter(|c| !c.is_collection())
                .map(|c| c.property_name.as_str())
                .collect(),
        };

        if select.is_some() {
            if let Some(pk) = self.model.primary_key() {
                if !properties.contains(&pk.property_name.as_str()) {
                    properties.push(&pk.property_name);
                }
            }
        }

        let mut parts = Vec::with_capacity(properties.len());
        for property in properties {
            let column = self.model.require_column(property)?;
            if column.is_collection() {
                continue;
            }
            if column.name == property {
                parts.push(quote_ident(property));
            } else {
                parts.push(format!(
                    "{} AS {}",
                    quote_ident(&column.name),
                    quote_ident(property)
                ));
            }
        }
        Ok(parts.join(","))
    }

    /// `ORDER BY ...`, or an empty string when there is nothing to sort by.
    pub fn order_statement(&self, sorts: &[Sort]) -> OrmResult<String> {
        let mut terms: Vec<String> = Vec::new();

        for sort in sorts {
            match sort {
                Sort::Text(text) => {
                    for token in text.split(',') {
                        let mut parts = token.split_whitespace();
                        let Some(property) = parts.next() else {
                            continue;
                        };
                        let direction: String = parts.collect();
                        terms.push(self.order_term(property, is_descending_text(&direction))?);
                    }
                }
                Sort::Keyed(map) => {
                    for (property, direction) in map {
                        terms.push(self.order_term(property, is_descending(direction))?);
                    }
                }
            }
        }

        if terms.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("ORDER BY {}", terms.join(",")))
    }

    fn order_term(&self, property: &str, descending: bool) -> OrmResult<String> {
        let column = quote_ident(self.column_name(property)?);
        if descending {
            Ok(format!("{column} DESC"))
        } else {
            Ok(column)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("name"), r#""name""#);
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
    }

    #[test]
    fn descending_detection() {
        assert!(is_descending(&serde_json::json!(-1)));
        assert!(is_descending(&serde_json::json!("-1")));
        assert!(is_descending(&serde_json::json!("DESC")));
        assert!(is_descending(&serde_json::json!("descending")));
        assert!(!is_descending(&serde_json::json!(1)));
        assert!(!is_descending(&serde_json::json!("asc")));
    }
}
