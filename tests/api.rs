use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use phonestore_backend::audit::{AuditTrail, AuditWorker};
use phonestore_backend::auth::jwt::sign_token;
use phonestore_backend::config::Config;
use phonestore_backend::database;
use phonestore_backend::routes::create_router;
use phonestore_backend::state::AppState;

const SECRET: &str = "api-test-secret";

async fn app() -> Router {
    let pool = database::create_pool("sqlite::memory:", 1).await.unwrap();
    database::run_migrations(&pool).await.unwrap();
    let (audit, rx) = AuditTrail::new(256);
    tokio::spawn(AuditWorker::new(pool.clone()).run(rx));
    create_router(AppState::new(pool, audit, Config::for_tests(SECRET)))
}

fn token(role: &str) -> String {
    sign_token(1, role, "tester", SECRET).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, role: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(role) = role {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(role)));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn create_product(app: &Router, name: &str, quantity: i64) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/api/products",
        Some("staff"),
        Some(json!({
            "name": name,
            "product_type": "phone",
            "purchase_price": 400.0,
            "selling_price": 600.0,
            "low_stock_threshold": 2,
            "initial_quantity": quantity,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn health_is_open() {
    let app = app().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn api_requires_bearer_token() {
    let app = app().await;

    let (status, body) = send(&app, "GET", "/api/products", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let request = Request::builder()
        .uri("/api/products")
        .header(header::AUTHORIZATION, "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn order_deducts_stock_and_surfaces_low_stock() {
    let app = app().await;
    let product_id = create_product(&app, "Galaxy S24", 3).await;

    let (status, order) = send(
        &app,
        "POST",
        "/api/orders",
        Some("staff"),
        Some(json!({
            "items": [{ "product_id": product_id, "quantity": 2 }],
            "customer": { "name": "Ana Lima", "phone": "555-0101" },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total_amount"], 1200.0);
    assert_eq!(order["items"].as_array().unwrap().len(), 1);

    let (status, low) = send(&app, "GET", "/api/inventory/low-stock", Some("staff"), None).await;
    assert_eq!(status, StatusCode::OK);
    let low = low.as_array().unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0]["id"], product_id);
    assert_eq!(low[0]["quantity"], 1);
    assert_eq!(low[0]["is_low_stock"], true);

    let (status, history) = send(
        &app,
        "GET",
        &format!("/api/stock/movements/products/{product_id}"),
        Some("staff"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["current_quantity"], 1);
    assert_eq!(history["movements"][0]["movement_type"], "sale");
    assert_eq!(history["movements"][0]["running_balance"], 1);
}

#[tokio::test]
async fn oversell_is_rejected_with_conflict() {
    let app = app().await;
    let product_id = create_product(&app, "Pixel 8", 1).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/orders",
        Some("staff"),
        Some(json!({
            "items": [{ "product_id": product_id, "quantity": 2 }],
            "customer": { "name": "Ana Lima" },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "insufficient_stock");

    let (_, product) = send(&app, "GET", &format!("/api/products/{product_id}"), Some("staff"), None).await;
    assert_eq!(product["quantity"], 1);
}

#[tokio::test]
async fn reconcile_is_manager_only() {
    let app = app().await;
    let product_id = create_product(&app, "iPhone 15", 5).await;
    let counts = json!([{ "product_id": product_id, "actual_count": 4 }]);

    let (status, body) = send(&app, "POST", "/api/inventory/reconcile", Some("staff"), Some(counts.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, report) = send(&app, "POST", "/api/inventory/reconcile", Some("manager"), Some(counts)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["adjusted_products"], 1);
    assert_eq!(report["variances"][0]["diff"], -1);
}

#[tokio::test]
async fn second_return_is_rejected() {
    let app = app().await;
    let product_id = create_product(&app, "Moto G", 4).await;

    let (_, order) = send(
        &app,
        "POST",
        "/api/orders",
        Some("staff"),
        Some(json!({
            "items": [{ "product_id": product_id, "quantity": 1 }],
            "customer": { "name": "Walk-in" },
            "is_pos_sale": true,
        })),
    )
    .await;
    let order_id = order["id"].as_i64().unwrap();
    assert_eq!(order["status"], "delivered");

    let uri = format!("/api/orders/{order_id}/return");
    let (status, returned) = send(&app, "POST", &uri, Some("staff"), Some(json!({ "reason": "Faulty" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["status"], "cancelled");

    let (status, body) = send(&app, "POST", &uri, Some("staff"), Some(json!({ "reason": "Faulty" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");

    let (_, product) = send(&app, "GET", &format!("/api/products/{product_id}"), Some("staff"), None).await;
    assert_eq!(product["quantity"], 4);
}

#[tokio::test]
async fn repair_deliver_without_body_requires_ready() {
    let app = app().await;

    let (status, repair) = send(
        &app,
        "POST",
        "/api/repairs",
        Some("staff"),
        Some(json!({
            "customer_name": "Sam",
            "device_model": "iPhone 12",
            "issue_description": "No power",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let repair_id = repair["id"].as_i64().unwrap();

    let (status, body) = send(&app, "POST", &format!("/api/repairs/{repair_id}/deliver"), Some("staff"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");
}
