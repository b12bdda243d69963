//! Model metadata consumed by the statement compiler.
//!
//! A [`ModelMetadata`] describes one entity: its table, its ordered columns and
//! an index from property name to column. Metadata is built once at
//! registration time and shared read-only (behind `Arc`) by every compile call.
//! [`ModelRegistry`] resolves relation targets by case-insensitive model name.

use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Declared type of a plain column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
    Json,
    Array,
    StringArray,
    IntegerArray,
    FloatArray,
    BooleanArray,
}

impl ColumnType {
    /// Whether values of this column are Postgres arrays.
    pub fn is_array(self) -> bool {
        matches!(
            self,
            ColumnType::Array
                | ColumnType::StringArray
                | ColumnType::IntegerArray
                | ColumnType::FloatArray
                | ColumnType::BooleanArray
        )
    }

    /// Cast applied to an array parameter compared against a column of this type.
    pub fn array_cast(self) -> &'static str {
        match self {
            ColumnType::Integer => "::INTEGER[]",
            ColumnType::Float => "::NUMERIC[]",
            ColumnType::Boolean => "::BOOLEAN[]",
            _ => "::TEXT[]",
        }
    }
}

/// Default applied to a column on insert when no value is supplied.
#[derive(Clone)]
pub enum DefaultValue {
    /// A fixed value.
    Static(Value),
    /// A zero-argument producer evaluated once per inserted row.
    Producer(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    /// Produce the default value.
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Static(v) => v.clone(),
            DefaultValue::Producer(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(v) => f.debug_tuple("Static").field(v).finish(),
            DefaultValue::Producer(_) => f.debug_tuple("Producer").field(&"<fn>").finish(),
        }
    }
}

/// What a column holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    /// A scalar or array column.
    Type(ColumnType),
    /// A foreign key to another model's primary key.
    Model { model: String },
    /// One-to-many / many-to-many collection. Never materialized as a SQL column.
    Collection {
        collection: String,
        via: String,
        through: Option<String>,
    },
}

/// A single column descriptor.
#[derive(Debug, Clone)]
pub struct Column {
    /// Physical column name.
    pub name: String,
    /// Property name on the entity.
    pub property_name: String,
    pub kind: ColumnKind,
    pub required: bool,
    pub primary: bool,
    pub default: Option<DefaultValue>,
    /// Stamped with the current time on insert.
    pub create_date: bool,
    /// Stamped with the current time on insert and update.
    pub update_date: bool,
}

impl Column {
    fn with_kind(property_name: impl Into<String>, kind: ColumnKind) -> Self {
        let property_name = property_name.into();
        Self {
            name: property_name.clone(),
            property_name,
            kind,
            required: false,
            primary: false,
            default: None,
            create_date: false,
            update_date: false,
        }
    }

    /// A typed column whose physical name equals the property name.
    pub fn new(property_name: impl Into<String>, column_type: ColumnType) -> Self {
        Self::with_kind(property_name, ColumnKind::Type(column_type))
    }

    /// A foreign key column referencing `model`.
    pub fn model(property_name: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_kind(
            property_name,
            ColumnKind::Model {
                model: model.into(),
            },
        )
    }

    /// A one-to-many collection of `collection` linked back through `via`.
    pub fn collection(
        property_name: impl Into<String>,
        collection: impl Into<String>,
        via: impl Into<String>,
    ) -> Self {
        Self::with_kind(
            property_name,
            ColumnKind::Collection {
                collection: collection.into(),
                via: via.into(),
                through: None,
            },
        )
    }

    /// Turn a collection into a many-to-many collection through a join model.
    pub fn through(mut self, through: impl Into<String>) -> Self {
        if let ColumnKind::Collection { through: t, .. } = &mut self.kind {
            *t = Some(through.into());
        }
        self
    }

    /// Override the physical column name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Producer(Arc::new(producer)));
        self
    }

    pub fn create_date(mut self) -> Self {
        self.create_date = true;
        self
    }

    pub fn update_date(mut self) -> Self {
        self.update_date = true;
        self
    }

    /// Declared type for typed columns.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self.kind {
            ColumnKind::Type(t) => Some(t),
            _ => None,
        }
    }

    /// Target model name for foreign key columns.
    pub fn related_model(&self) -> Option<&str> {
        match &self.kind {
            ColumnKind::Model { model } => Some(model),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind, ColumnKind::Collection { .. })
    }

    pub fn is_array(&self) -> bool {
        self.column_type().is_some_and(ColumnType::is_array)
    }

    pub fn is_json(&self) -> bool {
        self.column_type() == Some(ColumnType::Json)
    }
}

/// Static description of an entity's table and columns.
#[derive(Debug, Clone)]
pub struct ModelMetadata {
    name: String,
    table_name: String,
    columns: Vec<Column>,
    by_property: HashMap<String, usize>,
    primary: Option<usize>,
}

impl ModelMetadata {
    /// Build metadata, validating property uniqueness and the primary key.
    pub fn new(
        name: impl Into<String>,
        table_name: impl Into<String>,
        columns: Vec<Column>,
    ) -> OrmResult<Self> {
        let name = name.into();
        let mut by_property = HashMap::with_capacity(columns.len());
        let mut primary = None;

        for (idx, column) in columns.iter().enumerate() {
            if by_property
                .insert(column.property_name.clone(), idx)
                .is_some()
            {
                return Err(OrmError::validation(format!(
                    "Model '{}' declares property '{}' more than once",
                    name, column.property_name
                )));
            }
            if column.primary {
                if primary.is_some() {
                    return Err(OrmError::validation(format!(
                        "Model '{}' declares more than one primary key",
                        name
                    )));
                }
                primary = Some(idx);
            }
        }

        // Without an explicit flag, a property named "id" is the primary key.
        let primary = primary.or_else(|| by_property.get("id").copied());

        Ok(Self {
            name,
            table_name: table_name.into(),
            columns,
            by_property,
            primary,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by property name.
    pub fn column(&self, property_name: &str) -> Option<&Column> {
        self.by_property
            .get(property_name)
            .map(|&idx| &self.columns[idx])
    }

    /// Look up a column, failing with [`OrmError::UnknownProperty`].
    pub fn require_column(&self, property_name: &str) -> OrmResult<&Column> {
        self.column(property_name)
            .ok_or_else(|| OrmError::unknown_property(&self.name, property_name))
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.primary.map(|idx| &self.columns[idx])
    }

    /// Columns stamped on update.
    pub fn update_date_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.update_date)
    }
}

/// Registry of models keyed by lower-cased model name.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<ModelMetadata>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model, replacing any previous model with the same name.
    pub fn register(&mut self, model: ModelMetadata) -> Arc<ModelMetadata> {
        let model = Arc::new(model);
        self.models
            .insert(model.name().to_lowercase(), Arc::clone(&model));
        model
    }

    /// Find a model by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&Arc<ModelMetadata>> {
        self.models.get(&name.to_lowercase())
    }

    /// Resolve the target of a relation column.
    pub fn require_related(
        &self,
        model: &ModelMetadata,
        column: &Column,
    ) -> OrmResult<&Arc<ModelMetadata>> {
        let related = column.related_model().unwrap_or_default();
        self.get(related).ok_or_else(|| OrmError::UnknownRelatedModel {
            model: model.name().to_string(),
            property: column.property_name.clone(),
            related: related.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> ModelMetadata {
        ModelMetadata::new(
            "Product",
            "products",
            vec![
                Column::new("id", ColumnType::Integer).primary(),
                Column::new("name", ColumnType::String).required(),
                Column::new("createdAt", ColumnType::Datetime)
                    .name("created_at")
                    .create_date(),
                Column::model("store", "Store"),
                Column::collection("categories", "Category", "product").through("ProductCategory"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn indexes_columns_by_property() {
        let model = product();
        assert_eq!(model.column("createdAt").unwrap().name, "created_at");
        assert!(model.column("created_at").is_none());
        assert_eq!(model.primary_key().unwrap().property_name, "id");
    }

    #[test]
    fn rejects_two_primary_keys() {
        let err = ModelMetadata::new(
            "Bad",
            "bad",
            vec![
                Column::new("a", ColumnType::Integer).primary(),
                Column::new("b", ColumnType::Integer).primary(),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, OrmError::Validation(_)));
    }

    #[test]
    fn id_is_assumed_primary() {
        let model = ModelMetadata::new(
            "Tag",
            "tags",
            vec![
                Column::new("name", ColumnType::String),
                Column::new("id", ColumnType::Integer),
            ],
        )
        .unwrap();
        assert_eq!(model.primary_key().unwrap().property_name, "id");
    }

    #[test]
    fn registry_is_case_insensitive() {
        let mut registry = ModelRegistry::new();
        registry.register(product());
        assert!(registry.get("PRODUCT").is_some());
        assert!(registry.get("product").is_some());
    }

    #[test]
    fn missing_related_model() {
        let registry = ModelRegistry::new();
        let model = product();
        let store = model.column("store").unwrap();
        let err = registry.require_related(&model, store).unwrap_err();
        assert!(matches!(err, OrmError::UnknownRelatedModel { .. }));
    }

    #[test]
    fn collection_is_not_materialized() {
        let model = product();
        let categories = model.column("categories").unwrap();
        assert!(categories.is_collection());
        assert!(categories.column_type().is_none());
    }
}
