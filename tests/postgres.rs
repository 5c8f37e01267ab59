//! Round trip against a live PostgreSQL. Runs only when `TEST_DATABASE_URL` is set.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use table_crud::{
    fallback, mount, Controller, Criterion, Database, Op, OrderDir, PgRepository, Repository, ResolvedResource,
    ResourceConfig, Row, Selector,
};
use tower::ServiceExt;

fn row(v: Value) -> Row {
    v.as_object().cloned().unwrap()
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let res = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn repository_round_trip() {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return;
    };
    let db = Database::connect(&url, None, 2).await.unwrap();
    db.start().await.unwrap();
    let table = format!("crud_it_{}", uuid::Uuid::new_v4().simple());
    sqlx::query(&format!(
        "CREATE TABLE \"{}\" (\"id\" UUID PRIMARY KEY, \"name\" TEXT, \"age\" INTEGER, \"active\" BOOLEAN, \
         \"price\" NUMERIC(10,2), \"born\" DATE, \"opens\" TIME, \"tags\" JSONB, \"labels\" TEXT[], \
         \"created_at\" TIMESTAMPTZ)",
        table
    ))
    .execute(db.rw())
    .await
    .unwrap();

    let config: ResourceConfig = serde_json::from_value(json!({
        "table_name": table,
        "id_type": "uuid",
        "created_at_column": "created_at",
        "columns": ["id", "name", "age", "active", "price", "born", "opens", "tags", "labels", "created_at"]
    }))
    .unwrap();
    let mut resource = ResolvedResource::from_config(&config);
    db.resolve_column_types(std::slice::from_mut(&mut resource)).await.unwrap();
    assert_eq!(resource.pg_type("age"), Some("int4"));
    assert_eq!(resource.pg_type("labels"), Some("_text"));
    let resource = Arc::new(resource);
    let repo = Arc::new(PgRepository::new(&db, resource.clone()));

    let rex = uuid::Uuid::new_v4().to_string();
    let id = repo
        .insert_one(&row(json!({
            "id": rex,
            "name": "Rex",
            "age": 3,
            "active": true,
            "price": 19.99,
            "born": "2020-01-02",
            "opens": "10:00",
            "tags": ["good"],
            "labels": ["a", "b"],
            "created_at": "2024-01-02T03:04:05+00:00"
        })))
        .await
        .unwrap();
    assert_eq!(id, Some(json!(rex)));
    let tom = uuid::Uuid::new_v4().to_string();
    repo.insert_one(&row(json!({"id": tom, "name": "Tom", "age": null, "active": false, "price": 5})))
        .await
        .unwrap();

    let found = repo.select_one(&Selector::by_id(&resource, json!(rex))).await.unwrap().unwrap();
    assert_eq!(found["name"], "Rex");
    assert_eq!(found["age"], 3);
    assert_eq!(found["active"], true);
    assert_eq!(found["price"], "19.99");
    assert_eq!(found["born"], "2020-01-02");
    assert_eq!(found["opens"], "10:00:00");
    assert_eq!(found["tags"], json!(["good"]));
    assert_eq!(found["labels"], json!(["a", "b"]));
    assert!(found["created_at"].as_str().unwrap().starts_with("2024-01-02T03:04:05"));

    assert_eq!(repo.count(&[]).await.unwrap(), 2);
    assert_eq!(repo.count(&[Criterion::new("age", Op::Nil, Value::Null)]).await.unwrap(), 1);
    assert_eq!(repo.count(&[Criterion::new("name", Op::ILike, "r%")]).await.unwrap(), 1);
    assert_eq!(repo.count(&[Criterion::new("age", Op::Gte, "2")]).await.unwrap(), 1);
    assert_eq!(repo.count(&[Criterion::new("price", Op::Gt, 10)]).await.unwrap(), 1);
    assert_eq!(
        repo.count(&[Criterion::list("name", Op::In, vec![json!("Rex"), json!("Tom")])])
            .await
            .unwrap(),
        2
    );

    // Numeric order, not the order of the text the column is selected as.
    let mut selector = Selector::by_id(&resource, json!(rex));
    selector.criteria.clear();
    selector.order_by = "price".into();
    selector.order_dir = OrderDir::Desc;
    selector.limit = 10;
    let names: Vec<Value> = repo
        .select_many(&selector)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r["name"].clone())
        .collect();
    assert_eq!(names, vec![json!("Rex"), json!("Tom")]);

    let app = mount(Router::new(), Arc::new(Controller::new(repo.clone()))).fallback(fallback);
    let (status, body) = get(&app, &format!("/{}?age=3", table)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"]["count"], 1);
    let (status, body) = get(&app, &format!("/{}?active=false", table)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["name"], "Tom");
    let (status, body) = get(&app, &format!("/{}?age=abc", table)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    let criteria = "criteria=%5B%7B%22k%22%3A%22name%22%2C%22v%22%3A3%7D%5D";
    let (status, body) = get(&app, &format!("/{}?{}", table, criteria)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"]["count"], 0);

    assert_eq!(repo.update_one(&json!(tom), &row(json!({"age": 7}))).await.unwrap(), 1);
    assert_eq!(repo.count(&[Criterion::eq("age", 7)]).await.unwrap(), 1);
    assert_eq!(repo.delete_one(&json!(tom)).await.unwrap(), 1);
    assert_eq!(repo.delete_one(&json!(tom)).await.unwrap(), 0);

    sqlx::query(&format!("DROP TABLE \"{}\"", table)).execute(db.rw()).await.unwrap();
    db.stop().await;
}
