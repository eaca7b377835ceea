use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, UserId};
use domain::{
    InventoryItem, InventoryReservation, Money, Order, OrderStatus, Payment, PromoApplication,
    PromoCode, SagaStepRecord, Sku, StepId, User,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result,
    store::{MutationOutcome, SagaStore},
};

/// PostgreSQL-backed saga store implementation.
///
/// Each trait method runs as one transaction. The conditional resource
/// mutations use `UPDATE … WHERE x >= n` so the check and the decrement
/// are a single atomic statement under row locking.
#[derive(Clone)]
pub struct PostgresSagaStore {
    pool: PgPool,
}

impl PostgresSagaStore {
    /// Creates a new PostgreSQL saga store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        tracing::info!("running database migrations");
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_user(row: PgRow) -> Result<User> {
        Ok(User {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            balance: Money::from_cents(row.try_get("balance_cents")?),
        })
    }

    fn row_to_item(row: PgRow) -> Result<InventoryItem> {
        Ok(InventoryItem {
            sku: Sku::new(row.try_get::<String, _>("sku")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            on_hand: row.try_get::<i32, _>("on_hand")? as u32,
        })
    }

    fn row_to_promo(row: PgRow) -> Result<PromoCode> {
        Ok(PromoCode {
            code: row.try_get("code")?,
            remaining_uses: row.try_get::<i32, _>("remaining_uses")? as u32,
            discount_amount: Money::from_cents(row.try_get("discount_cents")?),
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            sku: Sku::new(row.try_get::<String, _>("sku")?),
            qty: row.try_get::<i32, _>("qty")? as u32,
            promo_code: row.try_get("promo_code")?,
            base_amount: Money::from_cents(row.try_get("base_cents")?),
            discount_amount: Money::from_cents(row.try_get("discount_cents")?),
            final_amount: Money::from_cents(row.try_get("final_cents")?),
            status: status.parse::<OrderStatus>()?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_step(row: PgRow) -> Result<SagaStepRecord> {
        let status: String = row.try_get("status")?;
        Ok(SagaStepRecord {
            id: StepId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            step_name: row.try_get("step_name")?,
            status: status.parse()?,
            error: row.try_get("error")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
        })
    }
}

#[async_trait]
impl SagaStore for PostgresSagaStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query("INSERT INTO users (id, name, balance_cents) VALUES ($1, $2, $3)")
            .bind(user.id.as_uuid())
            .bind(&user.name)
            .bind(user.balance.cents())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_item(&self, item: &InventoryItem) -> Result<()> {
        sqlx::query("INSERT INTO inventory_items (sku, name, price_cents, on_hand) VALUES ($1, $2, $3, $4)")
            .bind(item.sku.as_str())
            .bind(&item.name)
            .bind(item.price.cents())
            .bind(item.on_hand as i32)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_promo(&self, promo: &PromoCode) -> Result<()> {
        sqlx::query(
            "INSERT INTO promo_codes (code, remaining_uses, discount_cents) VALUES ($1, $2, $3)",
        )
        .bind(&promo.code)
        .bind(promo.remaining_uses as i32)
        .bind(promo.discount_amount.cents())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, name, balance_cents FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_user).transpose()
    }

    async fn get_item(&self, sku: &Sku) -> Result<Option<InventoryItem>> {
        let row =
            sqlx::query("SELECT sku, name, price_cents, on_hand FROM inventory_items WHERE sku = $1")
                .bind(sku.as_str())
                .fetch_optional(&self.pool)
                .await?;
        row.map(Self::row_to_item).transpose()
    }

    async fn get_promo(&self, code: &str) -> Result<Option<PromoCode>> {
        let row = sqlx::query(
            "SELECT code, remaining_uses, discount_cents FROM promo_codes WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_promo).transpose()
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, sku, qty, promo_code, base_cents, discount_cents, final_cents, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.sku.as_str())
        .bind(order.qty as i32)
        .bind(&order.promo_code)
        .bind(order.base_amount.cents())
        .bind(order.discount_amount.cents())
        .bind(order.final_amount.cents())
        .bind(order.status.as_str())
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, sku, qty, promo_code, base_cents, discount_cents, final_cents, status, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_order).transpose()
    }

    async fn transition_order(&self, id: OrderId, status: OrderStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1 AND status = $3")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .bind(OrderStatus::Pending.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_step(&self, record: &SagaStepRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO saga_steps (id, order_id, step_name, status, error, started_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.order_id.as_uuid())
        .bind(&record.step_name)
        .bind(record.status.as_str())
        .bind(&record.error)
        .bind(record.started_at)
        .bind(record.finished_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_step(&self, id: StepId) -> Result<()> {
        sqlx::query(
            "UPDATE saga_steps SET status = 'COMPLETED', finished_at = $2 WHERE id = $1 AND status = 'STARTED'",
        )
        .bind(id.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail_step(&self, id: StepId, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE saga_steps SET status = 'FAILED', error = $2, finished_at = $3 WHERE id = $1 AND status = 'STARTED'",
        )
        .bind(id.as_uuid())
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn steps_for_order(&self, order_id: OrderId) -> Result<Vec<SagaStepRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, step_name, status, error, started_at, finished_at
            FROM saga_steps
            WHERE order_id = $1
            ORDER BY started_at ASC, seq ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_step).collect()
    }

    async fn apply_promo(&self, order_id: OrderId, code: &str) -> Result<MutationOutcome> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE promo_codes SET remaining_uses = remaining_uses - 1 WHERE code = $1 AND remaining_uses >= 1",
        )
        .bind(code)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM promo_codes WHERE code = $1)")
                    .bind(code)
                    .fetch_one(&mut *tx)
                    .await?;
            tracing::debug!(code, exists, "promo reservation rejected");
            return Ok(if exists {
                MutationOutcome::Exhausted
            } else {
                MutationOutcome::NotFound
            });
        }

        sqlx::query(
            "INSERT INTO promo_applications (id, order_id, code, status) VALUES ($1, $2, $3, 'APPLIED')",
        )
        .bind(Uuid::new_v4())
        .bind(order_id.as_uuid())
        .bind(code)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(MutationOutcome::Applied)
    }

    async fn cancel_promo(&self, order_id: OrderId, code: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated =
            sqlx::query("UPDATE promo_codes SET remaining_uses = remaining_uses + 1 WHERE code = $1")
                .bind(code)
                .execute(&mut *tx)
                .await?;

        if updated.rows_affected() == 0 {
            // Promo vanished; tolerate the orphan compensation.
            return Ok(());
        }

        sqlx::query(
            "UPDATE promo_applications SET status = 'CANCELLED' WHERE order_id = $1 AND code = $2 AND status = 'APPLIED'",
        )
        .bind(order_id.as_uuid())
        .bind(code)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn take_stock(&self, order_id: OrderId, sku: &Sku, qty: u32) -> Result<MutationOutcome> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE inventory_items SET on_hand = on_hand - $2 WHERE sku = $1 AND on_hand >= $2",
        )
        .bind(sku.as_str())
        .bind(qty as i32)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM inventory_items WHERE sku = $1)")
                    .bind(sku.as_str())
                    .fetch_one(&mut *tx)
                    .await?;
            return Ok(if exists {
                MutationOutcome::Exhausted
            } else {
                MutationOutcome::NotFound
            });
        }

        sqlx::query(
            "INSERT INTO inventory_reservations (id, order_id, sku, qty, status) VALUES ($1, $2, $3, $4, 'RESERVED')",
        )
        .bind(Uuid::new_v4())
        .bind(order_id.as_uuid())
        .bind(sku.as_str())
        .bind(qty as i32)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(MutationOutcome::Applied)
    }

    async fn put_back_stock(&self, order_id: OrderId, sku: &Sku, qty: u32) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated =
            sqlx::query("UPDATE inventory_items SET on_hand = on_hand + $2 WHERE sku = $1")
                .bind(sku.as_str())
                .bind(qty as i32)
                .execute(&mut *tx)
                .await?;

        if updated.rows_affected() == 0 {
            return Ok(());
        }

        sqlx::query(
            "UPDATE inventory_reservations SET status = 'RELEASED' WHERE order_id = $1 AND sku = $2 AND status = 'RESERVED'",
        )
        .bind(order_id.as_uuid())
        .bind(sku.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn debit_balance(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
    ) -> Result<MutationOutcome> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE users SET balance_cents = balance_cents - $2 WHERE id = $1 AND balance_cents >= $2",
        )
        .bind(user_id.as_uuid())
        .bind(amount.cents())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                    .bind(user_id.as_uuid())
                    .fetch_one(&mut *tx)
                    .await?;
            return Ok(if exists {
                MutationOutcome::Exhausted
            } else {
                MutationOutcome::NotFound
            });
        }

        sqlx::query(
            "INSERT INTO payments (id, order_id, user_id, amount_cents, status) VALUES ($1, $2, $3, $4, 'CHARGED')",
        )
        .bind(Uuid::new_v4())
        .bind(order_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(amount.cents())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(MutationOutcome::Applied)
    }

    async fn credit_balance(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated =
            sqlx::query("UPDATE users SET balance_cents = balance_cents + $2 WHERE id = $1")
                .bind(user_id.as_uuid())
                .bind(amount.cents())
                .execute(&mut *tx)
                .await?;

        if updated.rows_affected() == 0 {
            return Ok(());
        }

        sqlx::query(
            "UPDATE payments SET status = 'REFUNDED' WHERE order_id = $1 AND user_id = $2 AND status = 'CHARGED'",
        )
        .bind(order_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn application_for_order(
        &self,
        order_id: OrderId,
        code: &str,
    ) -> Result<Option<PromoApplication>> {
        let row = sqlx::query(
            "SELECT id, order_id, code, status FROM promo_applications WHERE order_id = $1 AND code = $2",
        )
        .bind(order_id.as_uuid())
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let status: String = row.try_get("status")?;
            Ok(PromoApplication {
                id: row.try_get("id")?,
                order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
                code: row.try_get("code")?,
                status: status.parse()?,
            })
        })
        .transpose()
    }

    async fn reservation_for_order(
        &self,
        order_id: OrderId,
        sku: &Sku,
    ) -> Result<Option<InventoryReservation>> {
        let row = sqlx::query(
            "SELECT id, order_id, sku, qty, status FROM inventory_reservations WHERE order_id = $1 AND sku = $2",
        )
        .bind(order_id.as_uuid())
        .bind(sku.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let status: String = row.try_get("status")?;
            Ok(InventoryReservation {
                id: row.try_get("id")?,
                order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
                sku: Sku::new(row.try_get::<String, _>("sku")?),
                qty: row.try_get::<i32, _>("qty")? as u32,
                status: status.parse()?,
            })
        })
        .transpose()
    }

    async fn payment_for_order(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Payment>> {
        let row = sqlx::query(
            "SELECT id, order_id, user_id, amount_cents, status FROM payments WHERE order_id = $1 AND user_id = $2",
        )
        .bind(order_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let status: String = row.try_get("status")?;
            Ok(Payment {
                id: row.try_get("id")?,
                order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
                user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
                amount: Money::from_cents(row.try_get("amount_cents")?),
                status: status.parse()?,
            })
        })
        .transpose()
    }
}
