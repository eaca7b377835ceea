//! Loads demo data into the database.
//!
//! Wipes the saga tables and inserts a handful of users, inventory items
//! (one deliberately out of stock), and promo codes (one deliberately
//! exhausted), then prints the generated IDs for use against the API.

use api::config::Config;
use domain::{InventoryItem, Money, PromoCode, User};
use order_store::{PostgresSagaStore, SagaStore};

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    let store = PostgresSagaStore::new(pool);
    store.run_migrations().await.expect("migrations failed");

    // Clear in FK order.
    for table in [
        "saga_steps",
        "promo_applications",
        "inventory_reservations",
        "payments",
        "orders",
        "promo_codes",
        "inventory_items",
        "users",
    ] {
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(store.pool())
            .await
            .expect("failed to clear table");
    }

    let users = [
        User::new("Ivan Ivanov", Money::from_dollars(100_000)),
        User::new("Petr Petrov", Money::from_dollars(5_000)),
        User::new("Anna Smirnova", Money::from_dollars(500_000)),
    ];
    for user in &users {
        store.insert_user(user).await.expect("failed to insert user");
    }

    let items = [
        InventoryItem::new("LAPTOP-DELL", "Dell XPS 13", Money::from_dollars(85_000), 10),
        InventoryItem::new("MOUSE-WIRELESS", "Logitech wireless mouse", Money::from_dollars(1_500), 25),
        InventoryItem::new("LAPTOP-MAC", "MacBook Pro 16", Money::from_dollars(250_000), 3),
        InventoryItem::new("PHONE-IPHONE", "iPhone 15 Pro", Money::from_dollars(120_000), 0),
        InventoryItem::new("KEYBOARD", "Mechanical keyboard", Money::from_dollars(8_000), 15),
    ];
    for item in &items {
        store.insert_item(item).await.expect("failed to insert item");
    }

    let promos = [
        PromoCode::new("DISCOUNT10", 5, Money::from_dollars(1_000)),
        PromoCode::new("BIGDEAL", 2, Money::from_dollars(10_000)),
        PromoCode::new("ONETIME", 1, Money::from_dollars(5_000)),
        PromoCode::new("EXPIRED", 0, Money::from_dollars(2_000)),
    ];
    for promo in &promos {
        store.insert_promo(promo).await.expect("failed to insert promo");
    }

    println!("Seeded demo data\n");

    println!("Users:");
    for user in &users {
        println!("- {} {}: {}", user.id, user.name, user.balance);
    }

    println!("\nItems:");
    for item in &items {
        let stock = if item.on_hand > 0 { "IN_STOCK" } else { "OUT_OF_STOCK" };
        println!(
            "- [{stock}] {}: {} ({} on hand)",
            item.sku, item.price, item.on_hand
        );
    }

    println!("\nPromo codes:");
    for promo in &promos {
        println!(
            "- {}: -{} ({} uses left)",
            promo.code, promo.discount_amount, promo.remaining_uses
        );
    }
}
