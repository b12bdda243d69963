//! End-to-end compilation through the public API.

use pgrepo::{
    Column, ColumnType, CreateOptions, DestroyOptions, FindArgs, ModelMetadata, ModelRegistry,
    OnConflict, OrmError, Record, Repository, Returning, UpdateOptions, Value,
};
use serde_json::json;
use std::sync::Arc;

fn registry() -> Arc<ModelRegistry> {
    let mut registry = ModelRegistry::new();
    registry.register(
        ModelMetadata::new(
            "Store",
            "stores",
            vec![
                Column::new("id", ColumnType::Integer).primary(),
                Column::new("name", ColumnType::String).required(),
                Column::collection("products", "Product", "store"),
            ],
        )
        .unwrap(),
    );
    registry.register(
        ModelMetadata::new(
            "Product",
            "products",
            vec![
                Column::new("id", ColumnType::Integer).primary(),
                Column::new("name", ColumnType::String).required(),
                Column::new("tags", ColumnType::StringArray),
                Column::model("store", "Store").name("store_id"),
                Column::new("createdAt", ColumnType::Datetime)
                    .name("created_at")
                    .create_date(),
            ],
        )
        .unwrap(),
    );
    Arc::new(registry)
}

fn products() -> Repository {
    Repository::new(registry(), "Product").unwrap()
}

fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().unwrap()
}

#[test]
fn find_args_from_request_body() {
    let args: FindArgs = serde_json::from_value(json!({
        "select": ["name"],
        "where": {
            "or": [{"name": {"startsWith": "Bar"}}, {"tags": ["sale", "new"]}],
            "store": {"id": 3, "name": "Acme"},
        },
        "sort": [{"createdAt": -1}, "name"],
        "skip": 20,
        "limit": "10",
    }))
    .unwrap();

    let query = products().find_query(&args).unwrap();
    assert_eq!(
        query.sql,
        r#"SELECT "name","id" FROM "products" WHERE ("name" ILIKE $1 OR ($2=ANY("tags") OR $3=ANY("tags"))) AND "store_id"=$4 ORDER BY "created_at" DESC,"name" LIMIT 10 OFFSET 20"#
    );
    assert_eq!(
        query.params,
        vec![
            Value::Text("Bar%".into()),
            Value::Text("sale".into()),
            Value::Text("new".into()),
            Value::Int(3),
        ]
    );
}

#[test]
fn paginated_find() {
    let query = products()
        .find_query(&FindArgs::new().select(["id"]).paginate(2, 15))
        .unwrap();
    assert_eq!(
        query.sql,
        r#"SELECT "id" FROM "products" LIMIT 15 OFFSET 15"#
    );
}

#[test]
fn count_with_negation() {
    let query = products()
        .count_query(&json!({"!": {"or": [{"name": null}, {"tags": []}]}}))
        .unwrap();
    assert_eq!(
        query.sql,
        r#"SELECT count(*) AS "count" FROM "products" WHERE "name" IS NOT NULL AND "tags"<>'{}'"#
    );
    assert!(query.params.is_empty());
}

#[test]
fn create_many_with_upsert() {
    let rows = vec![
        record(json!({"id": 1, "name": "a", "store": 2, "createdAt": "2024-05-01T00:00:00Z"})),
        record(json!({"id": 2, "name": "b", "store": {"id": 2}, "createdAt": "2024-05-02T00:00:00Z"})),
    ];
    let query = products()
        .create_many_query(
            &rows,
            &CreateOptions::new()
                .on_conflict(OnConflict::merge(["id"]).merge_only(["name"]))
                .returning(Returning::Columns(vec!["name".into()])),
        )
        .unwrap();
    assert_eq!(
        query.sql,
        r#"INSERT INTO "products" ("id","name","store_id","created_at") VALUES ($1,$3,$5,$7),($2,$4,$6,$8) ON CONFLICT ("id") DO UPDATE SET "name"=EXCLUDED."name" RETURNING "name","id""#
    );
    assert_eq!(query.params[4], Value::Int(2));
    assert_eq!(query.params[5], Value::Int(2));
}

#[test]
fn create_requires_required_fields() {
    let err = products()
        .create_query(&record(json!({"tags": ["x"]})), &CreateOptions::new())
        .unwrap_err();
    assert!(err.is_compile_error());
    assert!(matches!(err, OrmError::MissingRequiredField { .. }));
}

#[test]
fn update_then_destroy() {
    let repo = products();

    let update = repo
        .update_query(
            &json!({"store": [1, 2]}),
            &record(json!({"tags": ["a"], "products": []})),
            &UpdateOptions::new().returning(Returning::None),
        )
        .unwrap();
    assert_eq!(
        update.sql,
        r#"UPDATE "products" SET "tags"=$1 WHERE "store_id"=ANY($2::INTEGER[])"#
    );

    let destroy = repo
        .destroy_query(&json!({"id": {">": 10}}), &DestroyOptions::new())
        .unwrap();
    assert_eq!(destroy.sql, r#"DELETE FROM "products" WHERE "id">$1"#);
    assert_eq!(destroy.params, vec![Value::Int(10)]);
}

#[test]
fn compile_errors() {
    let repo = products();

    let err = repo.count_query(&json!({"price": 1})).unwrap_err();
    assert!(matches!(err, OrmError::UnknownProperty { .. }));

    let err = repo.count_query(&json!({"tags": {">=": "a"}})).unwrap_err();
    assert!(matches!(err, OrmError::UnsupportedOperator { .. }));

    let err = repo.count_query(&json!({"store": {"name": "x"}})).unwrap_err();
    assert!(matches!(err, OrmError::UndefinedValue(_)));

    let err = repo.count_query(&json!({"name": {"like": 3}})).unwrap_err();
    assert!(matches!(err, OrmError::InvalidConstraint(_)));
}
