//! PostgreSQL integration tests
//!
//! These tests run serially with a single shared PostgreSQL container.
//! The container is automatically cleaned up when the test process exits.
//!
//! Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration
//! ```

use common::{OrderId, UserId};
use domain::{
    ApplicationStatus, InventoryItem, Money, Order, OrderStatus, PaymentStatus, PromoCode,
    ReservationStatus, SagaStepRecord, Sku, StepStatus, User,
};
use order_store::{MutationOutcome, PostgresSagaStore, SagaStore};
use serial_test::serial;
use sqlx::PgPool;
use std::sync::{Arc, OnceLock};
use testcontainers::{ContainerAsync, ImageExt, core::IntoContainerPort, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Container and connection string - initialized once, lives for entire test run
struct TestContainer {
    #[allow(dead_code)] // Container must stay alive for connection to work
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global container - OnceCell ensures single async initialization
static TEST_CONTAINER: OnceCell<Arc<TestContainer>> = OnceCell::const_new();

/// Store container ID for cleanup at exit
static CONTAINER_ID: OnceLock<String> = OnceLock::new();

/// Cleanup function that runs when the test process exits
#[ctor::dtor]
fn cleanup_container() {
    if let Some(container_id) = CONTAINER_ID.get() {
        // Use docker CLI to remove the container since we can't use async here
        let _ = std::process::Command::new("docker")
            .args(["rm", "-f", container_id])
            .output();
    }
}

/// Get the shared container (async, initializes on first call)
async fn get_container() -> Arc<TestContainer> {
    TEST_CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default()
                .with_tag("18-alpine")
                .start()
                .await
                .expect("Failed to start PostgreSQL container");

            let container_id = container.id().to_string();
            let _ = CONTAINER_ID.set(container_id);

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432.tcp()).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Run migrations
            let pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/0001_create_saga_tables.sql"))
                .execute(&pool)
                .await
                .unwrap();
            pool.close().await;

            Arc::new(TestContainer {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with cleared tables
async fn get_test_store() -> PostgresSagaStore {
    let container = get_container().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(&container.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query(
        "TRUNCATE TABLE saga_steps, promo_applications, inventory_reservations, payments, orders, promo_codes, inventory_items, users",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresSagaStore::new(pool)
}

async fn seed(store: &PostgresSagaStore) -> (UserId, Sku) {
    let user = User::new("Alice", Money::from_cents(100_000));
    let user_id = user.id;
    store.insert_user(&user).await.unwrap();

    let sku = Sku::new("ITEM001");
    store
        .insert_item(&InventoryItem::new(
            sku.clone(),
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

    (user_id, sku)
}

async fn insert_pending_order(store: &PostgresSagaStore, user_id: UserId, sku: &Sku) -> OrderId {
    let order = Order::pending(
        user_id,
        sku.clone(),
        2,
        None,
        Money::from_cents(20_000),
        Money::zero(),
    );
    store.insert_order(&order).await.unwrap();
    order.id
}

#[tokio::test]
#[serial]
async fn test_order_roundtrip() {
    let store = get_test_store().await;
    let (user_id, sku) = seed(&store).await;

    let order = Order::pending(
        user_id,
        sku.clone(),
        3,
        Some("DISCOUNT10".to_string()),
        Money::from_cents(30_000),
        Money::from_cents(1_000),
    );
    store.insert_order(&order).await.unwrap();

    let loaded = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.qty, 3);
    assert_eq!(loaded.promo_code.as_deref(), Some("DISCOUNT10"));
    assert_eq!(loaded.final_amount, Money::from_cents(29_000));
    assert_eq!(loaded.status, OrderStatus::Pending);

    assert!(store.get_order(OrderId::new()).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_transition_order_guards_terminal_statuses() {
    let store = get_test_store().await;
    let (user_id, sku) = seed(&store).await;
    let order_id = insert_pending_order(&store, user_id, &sku).await;

    assert!(
        store
            .transition_order(order_id, OrderStatus::Confirmed)
            .await
            .unwrap()
    );
    assert!(
        !store
            .transition_order(order_id, OrderStatus::Failed)
            .await
            .unwrap()
    );

    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
}

#[tokio::test]
#[serial]
async fn test_apply_promo_is_conditional() {
    let store = get_test_store().await;
    let (user_id, sku) = seed(&store).await;
    let order_id = insert_pending_order(&store, user_id, &sku).await;

    assert_eq!(
        store.apply_promo(order_id, "NOSUCH").await.unwrap(),
        MutationOutcome::NotFound
    );
    assert_eq!(
        store.apply_promo(order_id, "EXPIRED").await.unwrap(),
        MutationOutcome::Exhausted
    );
    assert_eq!(
        store.apply_promo(order_id, "DISCOUNT10").await.unwrap(),
        MutationOutcome::Applied
    );

    let promo = store.get_promo("DISCOUNT10").await.unwrap().unwrap();
    assert_eq!(promo.remaining_uses, 4);

    let application = store
        .application_for_order(order_id, "DISCOUNT10")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(application.status, ApplicationStatus::Applied);

    store.cancel_promo(order_id, "DISCOUNT10").await.unwrap();
    let promo = store.get_promo("DISCOUNT10").await.unwrap().unwrap();
    assert_eq!(promo.remaining_uses, 5);
    let application = store
        .application_for_order(order_id, "DISCOUNT10")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(application.status, ApplicationStatus::Cancelled);

    // Missing promo release is a tolerated no-op.
    store.cancel_promo(order_id, "NOSUCH").await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_stock_mutations_are_conditional() {
    let store = get_test_store().await;
    let (user_id, sku) = seed(&store).await;
    let order_id = insert_pending_order(&store, user_id, &sku).await;

    assert_eq!(
        store.take_stock(order_id, &sku, 20).await.unwrap(),
        MutationOutcome::Exhausted
    );
    assert_eq!(
        store
            .take_stock(order_id, &Sku::new("NOSUCH"), 1)
            .await
            .unwrap(),
        MutationOutcome::NotFound
    );
    assert_eq!(
        store.take_stock(order_id, &sku, 4).await.unwrap(),
        MutationOutcome::Applied
    );

    let item = store.get_item(&sku).await.unwrap().unwrap();
    assert_eq!(item.on_hand, 6);

    store.put_back_stock(order_id, &sku, 4).await.unwrap();
    let item = store.get_item(&sku).await.unwrap().unwrap();
    assert_eq!(item.on_hand, 10);
    let reservation = store
        .reservation_for_order(order_id, &sku)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Released);
}

#[tokio::test]
#[serial]
async fn test_balance_mutations_are_conditional() {
    let store = get_test_store().await;
    let (user_id, sku) = seed(&store).await;
    let order_id = insert_pending_order(&store, user_id, &sku).await;

    assert_eq!(
        store
            .debit_balance(order_id, user_id, Money::from_cents(200_000))
            .await
            .unwrap(),
        MutationOutcome::Exhausted
    );
    assert_eq!(
        store
            .debit_balance(order_id, UserId::new(), Money::from_cents(1))
            .await
            .unwrap(),
        MutationOutcome::NotFound
    );
    assert_eq!(
        store
            .debit_balance(order_id, user_id, Money::from_cents(20_000))
            .await
            .unwrap(),
        MutationOutcome::Applied
    );

    let user = store.get_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.balance, Money::from_cents(80_000));

    store
        .credit_balance(order_id, user_id, Money::from_cents(20_000))
        .await
        .unwrap();
    let user = store.get_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.balance, Money::from_cents(100_000));
    let payment = store
        .payment_for_order(order_id, user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Refunded);
}

#[tokio::test]
#[serial]
async fn test_audit_trail_ordering_and_lifecycle() {
    let store = get_test_store().await;
    let (user_id, sku) = seed(&store).await;
    let order_id = insert_pending_order(&store, user_id, &sku).await;

    let first = SagaStepRecord::started(order_id, "ReserveInventory");
    store.insert_step(&first).await.unwrap();
    store.complete_step(first.id).await.unwrap();

    let second = SagaStepRecord::started(order_id, "ChargeUserBalance");
    store.insert_step(&second).await.unwrap();
    store.fail_step(second.id, "insufficient balance").await.unwrap();

    let compensation = SagaStepRecord::finished(order_id, "Compensate_ReserveInventory");
    store.insert_step(&compensation).await.unwrap();

    let steps = store.steps_for_order(order_id).await.unwrap();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[0].step_name, "ReserveInventory");
    assert_eq!(steps[0].status, StepStatus::Completed);
    assert_eq!(steps[1].status, StepStatus::Failed);
    assert_eq!(steps[1].error.as_deref(), Some("insufficient balance"));
    assert_eq!(steps[2].step_name, "Compensate_ReserveInventory");
    assert_eq!(steps[2].status, StepStatus::Completed);
    assert_eq!(steps[2].finished_at, Some(steps[2].started_at));

    // Terminal rows never move again.
    store.complete_step(second.id).await.unwrap();
    let steps = store.steps_for_order(order_id).await.unwrap();
    assert_eq!(steps[1].status, StepStatus::Failed);
}
