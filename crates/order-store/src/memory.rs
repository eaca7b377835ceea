use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, UserId};
use domain::{
    ApplicationStatus, InventoryItem, InventoryReservation, Money, Order, OrderStatus, Payment,
    PaymentStatus, PromoApplication, PromoCode, ReservationStatus, SagaStepRecord, Sku, StepId,
    StepStatus, User,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    Result,
    store::{MutationOutcome, SagaStore},
};

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, User>,
    items: HashMap<String, InventoryItem>,
    promos: HashMap<String, PromoCode>,
    orders: HashMap<OrderId, Order>,
    steps: Vec<SagaStepRecord>,
    applications: Vec<PromoApplication>,
    reservations: Vec<InventoryReservation>,
    payments: Vec<Payment>,
}

/// In-memory saga store implementation for testing.
///
/// Provides the same interface as the PostgreSQL implementation. Every
/// composite mutation runs under a single write lock, which gives it the
/// same atomicity the Postgres store gets from transactions.
#[derive(Clone, Default)]
pub struct InMemorySagaStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemorySagaStore {
    /// Creates a new empty in-memory saga store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of audit rows stored.
    pub async fn step_count(&self) -> usize {
        self.inner.read().await.steps.len()
    }

    /// Clears all stored state.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        *inner = Inner::default();
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn insert_item(&self, item: &InventoryItem) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.items.insert(item.sku.as_str().to_string(), item.clone());
        Ok(())
    }

    async fn insert_promo(&self, promo: &PromoCode) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.promos.insert(promo.code.clone(), promo.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn get_item(&self, sku: &Sku) -> Result<Option<InventoryItem>> {
        Ok(self.inner.read().await.items.get(sku.as_str()).cloned())
    }

    async fn get_promo(&self, code: &str) -> Result<Option<PromoCode>> {
        Ok(self.inner.read().await.promos.get(code).cloned())
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn transition_order(&self, id: OrderId, status: OrderStatus) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Pending => {
                order.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_step(&self, record: &SagaStepRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.steps.push(record.clone());
        Ok(())
    }

    async fn complete_step(&self, id: StepId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(step) = inner
            .steps
            .iter_mut()
            .find(|s| s.id == id && s.status == StepStatus::Started)
        {
            step.status = StepStatus::Completed;
            step.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn fail_step(&self, id: StepId, error: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(step) = inner
            .steps
            .iter_mut()
            .find(|s| s.id == id && s.status == StepStatus::Started)
        {
            step.status = StepStatus::Failed;
            step.error = Some(error.to_string());
            step.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn steps_for_order(&self, order_id: OrderId) -> Result<Vec<SagaStepRecord>> {
        let inner = self.inner.read().await;
        let mut steps: Vec<_> = inner
            .steps
            .iter()
            .filter(|s| s.order_id == order_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order on timestamp ties.
        steps.sort_by_key(|s| s.started_at);
        Ok(steps)
    }

    async fn apply_promo(&self, order_id: OrderId, code: &str) -> Result<MutationOutcome> {
        let mut inner = self.inner.write().await;
        let Some(promo) = inner.promos.get_mut(code) else {
            return Ok(MutationOutcome::NotFound);
        };
        if promo.remaining_uses == 0 {
            return Ok(MutationOutcome::Exhausted);
        }
        promo.remaining_uses -= 1;
        inner.applications.push(PromoApplication {
            id: Uuid::new_v4(),
            order_id,
            code: code.to_string(),
            status: ApplicationStatus::Applied,
        });
        Ok(MutationOutcome::Applied)
    }

    async fn cancel_promo(&self, order_id: OrderId, code: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let Some(promo) = inner.promos.get_mut(code) else {
            return Ok(());
        };
        promo.remaining_uses += 1;
        if let Some(application) = inner
            .applications
            .iter_mut()
            .find(|a| a.order_id == order_id && a.code == code && a.status == ApplicationStatus::Applied)
        {
            application.status = ApplicationStatus::Cancelled;
        }
        Ok(())
    }

    async fn take_stock(&self, order_id: OrderId, sku: &Sku, qty: u32) -> Result<MutationOutcome> {
        let mut inner = self.inner.write().await;
        let Some(item) = inner.items.get_mut(sku.as_str()) else {
            return Ok(MutationOutcome::NotFound);
        };
        if item.on_hand < qty {
            return Ok(MutationOutcome::Exhausted);
        }
        item.on_hand -= qty;
        inner.reservations.push(InventoryReservation {
            id: Uuid::new_v4(),
            order_id,
            sku: sku.clone(),
            qty,
            status: ReservationStatus::Reserved,
        });
        Ok(MutationOutcome::Applied)
    }

    async fn put_back_stock(&self, order_id: OrderId, sku: &Sku, qty: u32) -> Result<()> {
        let mut inner = self.inner.write().await;
        let Some(item) = inner.items.get_mut(sku.as_str()) else {
            return Ok(());
        };
        item.on_hand += qty;
        if let Some(reservation) = inner
            .reservations
            .iter_mut()
            .find(|r| r.order_id == order_id && r.sku == *sku && r.status == ReservationStatus::Reserved)
        {
            reservation.status = ReservationStatus::Released;
        }
        Ok(())
    }

    async fn debit_balance(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
    ) -> Result<MutationOutcome> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Ok(MutationOutcome::NotFound);
        };
        if user.balance < amount {
            return Ok(MutationOutcome::Exhausted);
        }
        user.balance -= amount;
        inner.payments.push(Payment {
            id: Uuid::new_v4(),
            order_id,
            user_id,
            amount,
            status: PaymentStatus::Charged,
        });
        Ok(MutationOutcome::Applied)
    }

    async fn credit_balance(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.get_mut(&user_id) else {
            return Ok(());
        };
        user.balance += amount;
        if let Some(payment) = inner
            .payments
            .iter_mut()
            .find(|p| p.order_id == order_id && p.user_id == user_id && p.status == PaymentStatus::Charged)
        {
            payment.status = PaymentStatus::Refunded;
        }
        Ok(())
    }

    async fn application_for_order(
        &self,
        order_id: OrderId,
        code: &str,
    ) -> Result<Option<PromoApplication>> {
        let inner = self.inner.read().await;
        Ok(inner
            .applications
            .iter()
            .find(|a| a.order_id == order_id && a.code == code)
            .cloned())
    }

    async fn reservation_for_order(
        &self,
        order_id: OrderId,
        sku: &Sku,
    ) -> Result<Option<InventoryReservation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .reservations
            .iter()
            .find(|r| r.order_id == order_id && r.sku == *sku)
            .cloned())
    }

    async fn payment_for_order(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Payment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .iter()
            .find(|p| p.order_id == order_id && p.user_id == user_id)
            .cloned())
    }
}
