use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{
    InventoryItem, InventoryReservation, Money, Order, OrderStatus, Payment, PromoApplication,
    PromoCode, SagaStepRecord, Sku, StepId, User,
};

use crate::Result;

/// Outcome of a conditional resource mutation.
///
/// The store reports which precondition failed so callers can raise the
/// right business error; the check and the write happen atomically inside
/// the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The mutation was applied and its side-effect record written.
    Applied,
    /// The target row does not exist.
    NotFound,
    /// The target exists but the conditional check failed (no uses left,
    /// insufficient stock, insufficient balance).
    Exhausted,
}

impl MutationOutcome {
    /// Returns true if the mutation went through.
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }
}

/// Core trait for saga store implementations.
///
/// The store is the unit-of-work boundary: every method is a single atomic
/// unit, executed in its own transaction (Postgres) or under one lock
/// scope (in-memory). In particular each conditional resource mutation
/// pairs the check-and-write with its side-effect record insert, so
/// concurrent sagas cannot produce lost updates on `remaining_uses`,
/// `on_hand`, or `balance`.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait SagaStore: Send + Sync {
    // -- Reference data --

    /// Inserts a user account.
    async fn insert_user(&self, user: &User) -> Result<()>;

    /// Inserts an inventory item.
    async fn insert_item(&self, item: &InventoryItem) -> Result<()>;

    /// Inserts a promo code.
    async fn insert_promo(&self, promo: &PromoCode) -> Result<()>;

    /// Fetches a user by ID.
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// Fetches an inventory item by SKU.
    async fn get_item(&self, sku: &Sku) -> Result<Option<InventoryItem>>;

    /// Fetches a promo code.
    async fn get_promo(&self, code: &str) -> Result<Option<PromoCode>>;

    // -- Orders --

    /// Persists a new order.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    /// Fetches an order by ID.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Moves an order out of `Pending` into the given status.
    ///
    /// Returns false when the order is missing or already terminal;
    /// terminal statuses never revert.
    async fn transition_order(&self, id: OrderId, status: OrderStatus) -> Result<bool>;

    // -- Audit trail --

    /// Persists an audit row exactly as given.
    ///
    /// Used both for durable `Started` rows ahead of a step's execution
    /// and for compensation rows born `Completed`.
    async fn insert_step(&self, record: &SagaStepRecord) -> Result<()>;

    /// Marks a `Started` row `Completed` and stamps `finished_at`.
    async fn complete_step(&self, id: StepId) -> Result<()>;

    /// Marks a `Started` row `Failed` with the error text and stamps
    /// `finished_at`.
    async fn fail_step(&self, id: StepId, error: &str) -> Result<()>;

    /// Returns the audit trail for an order, ordered by `started_at`.
    async fn steps_for_order(&self, order_id: OrderId) -> Result<Vec<SagaStepRecord>>;

    // -- Resource mutations --

    /// Consumes one use of a promo code and records an `Applied`
    /// application for the order. The decrement happens only while
    /// `remaining_uses >= 1`.
    async fn apply_promo(&self, order_id: OrderId, code: &str) -> Result<MutationOutcome>;

    /// Returns one use to a promo code and flips the order's `Applied`
    /// application to `Cancelled`. A missing promo is a no-op.
    async fn cancel_promo(&self, order_id: OrderId, code: &str) -> Result<()>;

    /// Takes `qty` units out of stock and records a `Reserved`
    /// reservation for the order. The decrement happens only while
    /// `on_hand >= qty`.
    async fn take_stock(&self, order_id: OrderId, sku: &Sku, qty: u32) -> Result<MutationOutcome>;

    /// Puts `qty` units back and flips the order's `Reserved` row to
    /// `Released`. A missing item is a no-op.
    async fn put_back_stock(&self, order_id: OrderId, sku: &Sku, qty: u32) -> Result<()>;

    /// Debits a user's balance and records a `Charged` payment for the
    /// order. The debit happens only while `balance >= amount`.
    async fn debit_balance(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
    ) -> Result<MutationOutcome>;

    /// Credits the amount back and flips the order's `Charged` payment to
    /// `Refunded`. A missing user is a no-op.
    async fn credit_balance(&self, order_id: OrderId, user_id: UserId, amount: Money)
    -> Result<()>;

    // -- Side-effect records --

    /// Fetches the promo application written for an order, if any.
    async fn application_for_order(
        &self,
        order_id: OrderId,
        code: &str,
    ) -> Result<Option<PromoApplication>>;

    /// Fetches the inventory reservation written for an order, if any.
    async fn reservation_for_order(
        &self,
        order_id: OrderId,
        sku: &Sku,
    ) -> Result<Option<InventoryReservation>>;

    /// Fetches the payment written for an order, if any.
    async fn payment_for_order(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Payment>>;
}
