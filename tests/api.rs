//! End-to-end requests against the HTTP router, backed by an in-memory
//! SQLite catalog.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use costlib::{Config, Library, SqliteStore};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let store = SqliteStore::open_in_memory().unwrap();
    costlib::server::router(Library::new(store, &Config::default()))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |body| Body::from(body.to_string())))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn create(app: &Router, collection: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", &format!("/api/{collection}"), Some(body)).await
}

#[tokio::test]
async fn health_is_ok() {
    let (status, _) = send(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn creates_the_first_code_at_every_level() {
    let app = app();

    let (status, division) = create(&app, "divisions", json!({ "name": "Concrete" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(division["code"], "01");
    assert_eq!(division["level"], 1);
    assert_eq!(division["sort_order"], 1_000_000);
    assert_eq!(division["is_active"], true);

    let (_, section) = create(
        &app,
        "sections",
        json!({ "name": "Formwork", "parentCode": "01" }),
    )
    .await;
    assert_eq!(section["code"], "01.10");
    assert_eq!(section["parent_id"], division["id"]);

    let (_, assembly) = create(
        &app,
        "assemblies",
        json!({ "name": "Wall forms", "parentCode": "01.10" }),
    )
    .await;
    assert_eq!(assembly["code"], "01.10.10");

    let (status, item) = create(
        &app,
        "items",
        json!({ "name": "Plywood", "description": "18mm", "parentCode": "01.10.10" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["code"], "01.10.10.01");
    assert_eq!(item["description"], "18mm");
    assert_eq!(item["sort_order"], 1_101_001);
}

#[tokio::test]
async fn generate_proposes_after_the_highest_sibling() {
    let app = app();
    create(&app, "divisions", json!({ "name": "Concrete" })).await;
    for name in ["Formwork", "Rebar"] {
        create(&app, "sections", json!({ "name": name, "parentCode": "01" })).await;
    }

    let (status, body) = send(
        &app,
        "POST",
        "/api/codes/generate",
        Some(json!({ "level": 2, "parentCode": "01" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "code": "01.30" }));

    // nothing was reserved
    let (_, again) = send(
        &app,
        "POST",
        "/api/codes/generate",
        Some(json!({ "level": 2, "parentCode": "01" })),
    )
    .await;
    assert_eq!(again, json!({ "code": "01.30" }));
}

#[tokio::test]
async fn generate_rejects_bad_input() {
    let app = app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/codes/generate",
        Some(json!({ "level": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        "POST",
        "/api/codes/generate",
        Some(json!({ "level": 2, "parentCode": "1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/codes/generate",
        Some(json!({ "level": 2, "parentCode": "04" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn validate_reports_sort_key_and_parent() {
    let app = app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/codes/validate",
        Some(json!({ "code": "02.10", "level": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "valid": true, "sortKey": 2_100_000, "parentCode": "02" })
    );

    let (_, body) = send(
        &app,
        "POST",
        "/api/codes/validate",
        Some(json!({ "code": "2.10", "level": 2 })),
    )
    .await;
    assert_eq!(body["valid"], false);
    assert!(body.get("sortKey").is_none());
}

#[tokio::test]
async fn exists_checks_active_rows() {
    let app = app();
    create(&app, "divisions", json!({ "name": "Concrete" })).await;

    let (status, body) = send(&app, "GET", "/api/codes/01/exists?level=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "exists": true }));

    let (_, body) = send(&app, "GET", "/api/codes/02/exists?level=1", None).await;
    assert_eq!(body, json!({ "exists": false }));

    let (status, _) = send(&app, "GET", "/api/codes/1/exists?level=1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_errors_map_to_status_codes() {
    let app = app();
    create(&app, "divisions", json!({ "name": "Concrete", "code": "03" })).await;

    let (status, body) =
        create(&app, "divisions", json!({ "name": "Masonry", "code": "03" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("03"));

    let (status, _) = create(&app, "divisions", json!({ "name": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = create(&app, "sections", json!({ "name": "Formwork" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = create(
        &app,
        "sections",
        json!({ "name": "Formwork", "parentCode": "09" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = create(
        &app,
        "sections",
        json!({ "name": "Formwork", "parentCode": "03", "code": "04.10" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = create(&app, "divisions", json!({ "name": "Masonry", "code": " 04 " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = create(
        &app,
        "sections",
        json!({ "name": "Formwork", "parentCode": "03", "code": "03.00" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/divisions")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_filters_by_parent() {
    let app = app();
    create(&app, "divisions", json!({ "name": "Concrete" })).await;
    create(&app, "divisions", json!({ "name": "Masonry" })).await;
    create(&app, "sections", json!({ "name": "Formwork", "parentCode": "01" })).await;
    create(&app, "sections", json!({ "name": "Brick", "parentCode": "02" })).await;

    let (status, body) = send(&app, "GET", "/api/sections?parentCode=02", None).await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|node| node["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, ["02.10"]);

    let (_, body) = send(&app, "GET", "/api/divisions", None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn delete_requires_children_to_go_first() {
    let app = app();
    create(&app, "divisions", json!({ "name": "Concrete" })).await;
    create(&app, "sections", json!({ "name": "Formwork", "parentCode": "01" })).await;

    let (status, _) = send(&app, "DELETE", "/api/divisions/01", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, section) = send(&app, "DELETE", "/api/sections/01.10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(section["is_active"], false);

    let (status, _) = send(&app, "DELETE", "/api/divisions/01", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "DELETE", "/api/divisions/01", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "GET", "/api/divisions?includeInactive=true", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reconcile_reports_then_merges() {
    let app = app();
    create(&app, "divisions", json!({ "name": "Concrete" })).await;
    create(&app, "divisions", json!({ "name": "Concrete" })).await;
    create(&app, "sections", json!({ "name": "Rebar", "parentCode": "02" })).await;

    let (status, report) = send(&app, "POST", "/api/maintenance/reconcile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["applied"], false);
    assert_eq!(report["groups"].as_array().unwrap().len(), 1);

    let (_, report) = send(&app, "POST", "/api/maintenance/reconcile?apply=true", None).await;
    assert_eq!(report["applied"], true);

    let (_, divisions) = send(&app, "GET", "/api/divisions", None).await;
    assert_eq!(divisions.as_array().unwrap().len(), 1);

    let (_, sections) = send(&app, "GET", "/api/sections?parentCode=01", None).await;
    assert_eq!(sections.as_array().unwrap().len(), 1);
}
