//! Stock reservation and release.

use common::OrderId;
use domain::Sku;
use order_store::{MutationOutcome, SagaStore};

use crate::error::SagaError;

/// Service owning the inventory resource.
pub struct Inventory<S> {
    store: S,
}

impl<S: SagaStore> Inventory<S> {
    /// Creates a new inventory service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Takes `qty` units out of stock for the order. The decrement and
    /// the `Reserved` record are one atomic unit inside the store.
    pub async fn reserve_inventory(
        &self,
        order_id: OrderId,
        sku: &Sku,
        qty: u32,
    ) -> Result<(), SagaError> {
        match self.store.take_stock(order_id, sku, qty).await? {
            MutationOutcome::Applied => Ok(()),
            MutationOutcome::NotFound => Err(SagaError::ItemNotFound(sku.clone())),
            MutationOutcome::Exhausted => Err(SagaError::InsufficientStock {
                sku: sku.clone(),
                qty,
            }),
        }
    }

    /// Puts `qty` units back and releases the order's reservation. A
    /// missing item is a no-op, so an orphan compensation never raises.
    pub async fn release_inventory(
        &self,
        order_id: OrderId,
        sku: &Sku,
        qty: u32,
    ) -> Result<(), SagaError> {
        self.store.put_back_stock(order_id, sku, qty).await?;
        Ok(())
    }
}
