//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::UserId;
use domain::{InventoryItem, Money, PromoCode, User};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{InMemorySagaStore, SagaStore};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn setup() -> (axum::Router, InMemorySagaStore, UserId) {
    let store = InMemorySagaStore::new();

    let user = User::new("Alice", Money::from_cents(100_000));
    let user_id = user.id;
    store.insert_user(&user).await.unwrap();
    store
        .insert_item(&InventoryItem::new(
            "ITEM001",
            "Laptop",
            Money::from_cents(10_000),
            10,
        ))
        .await
        .unwrap();
    store
        .insert_promo(&PromoCode::new("DISCOUNT10", 5, Money::from_cents(1_000)))
        .await
        .unwrap();
    store
        .insert_promo(&PromoCode::new("EXPIRED", 0, Money::from_cents(1_500)))
        .await
        .unwrap();

    let state = api::create_state(store.clone());
    let app = api::create_app(state, get_metrics_handle());
    (app, store, user_id)
}

async fn post_order(app: &axum::Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/orders")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let (app, _, _) = setup().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "ok");
}

#[tokio::test]
async fn test_place_order_success() {
    let (app, store, user_id) = setup().await;

    let (status, json) = post_order(
        &app,
        serde_json::json!({
            "user_id": user_id.to_string(),
            "sku": "ITEM001",
            "qty": 2
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "CONFIRMED");
    assert_eq!(json["success"], true);
    assert_eq!(json["base_cents"], 20_000);
    assert_eq!(json["final_cents"], 20_000);
    assert_eq!(json["steps"].as_array().unwrap().len(), 3);

    let user = store.get_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.balance, Money::from_cents(80_000));
}

#[tokio::test]
async fn test_place_order_applies_discount() {
    let (app, _, user_id) = setup().await;

    let (status, json) = post_order(
        &app,
        serde_json::json!({
            "user_id": user_id.to_string(),
            "sku": "ITEM001",
            "qty": 1,
            "promo_code": "DISCOUNT10"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["discount_cents"], 1_000);
    assert_eq!(json["final_cents"], 9_000);
    assert_eq!(json["steps"].as_array().unwrap().len(), 4);
    assert_eq!(json["steps"][0]["step_name"], "ReservePromoUse");
}

#[tokio::test]
async fn test_failed_saga_returns_outcome_with_compensations() {
    let (app, store, user_id) = setup().await;

    let (status, json) = post_order(
        &app,
        serde_json::json!({
            "user_id": user_id.to_string(),
            "sku": "ITEM001",
            "qty": 1,
            "promo_code": "DISCOUNT10",
            "fail_at_step": "FinalizeOrder"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "FAILED");
    assert_eq!(json["success"], false);

    let steps = json["steps"].as_array().unwrap();
    let compensations: Vec<_> = steps
        .iter()
        .filter(|s| s["step_name"].as_str().unwrap().starts_with("Compensate_"))
        .collect();
    assert_eq!(compensations.len(), 3);

    let user = store.get_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.balance, Money::from_cents(100_000));
}

#[tokio::test]
async fn test_place_order_rejects_zero_qty() {
    let (app, _, user_id) = setup().await;

    let (status, json) = post_order(
        &app,
        serde_json::json!({
            "user_id": user_id.to_string(),
            "sku": "ITEM001",
            "qty": 0
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Quantity"));
}

#[tokio::test]
async fn test_place_order_rejects_unknown_user_and_item() {
    let (app, _, user_id) = setup().await;

    let (status, _) = post_order(
        &app,
        serde_json::json!({
            "user_id": uuid::Uuid::new_v4().to_string(),
            "sku": "ITEM001",
            "qty": 1
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post_order(
        &app,
        serde_json::json!({
            "user_id": user_id.to_string(),
            "sku": "NOSUCH",
            "qty": 1
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_place_order_rejects_bad_promos() {
    let (app, _, user_id) = setup().await;

    let (status, json) = post_order(
        &app,
        serde_json::json!({
            "user_id": user_id.to_string(),
            "sku": "ITEM001",
            "qty": 1,
            "promo_code": "NOSUCH"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("NOSUCH"));

    let (status, json) = post_order(
        &app,
        serde_json::json!({
            "user_id": user_id.to_string(),
            "sku": "ITEM001",
            "qty": 1,
            "promo_code": "EXPIRED"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("exhausted"));
}

#[tokio::test]
async fn test_place_order_rejects_unknown_fail_at_step() {
    let (app, _, user_id) = setup().await;

    let (status, json) = post_order(
        &app,
        serde_json::json!({
            "user_id": user_id.to_string(),
            "sku": "ITEM001",
            "qty": 1,
            "fail_at_step": "ShipOrder"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("ShipOrder"));
}

#[tokio::test]
async fn test_get_order_roundtrip() {
    let (app, _, user_id) = setup().await;

    let (_, placed) = post_order(
        &app,
        serde_json::json!({
            "user_id": user_id.to_string(),
            "sku": "ITEM001",
            "qty": 1
        }),
    )
    .await;
    let order_id = placed["order_id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{order_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["order_id"], order_id);
    assert_eq!(json["status"], "CONFIRMED");

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
