//! Promo code reservation, release, and discount computation.

use common::OrderId;
use domain::Money;
use order_store::{MutationOutcome, SagaStore};

use crate::error::SagaError;

/// Service owning the promo code resource.
pub struct Discounts<S> {
    store: S,
}

impl<S: SagaStore> Discounts<S> {
    /// Creates a new discounts service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the discount an order would receive.
    ///
    /// Zero when no code is given, when the code is unknown, or when the
    /// code has no uses left. Pure read; nothing is reserved.
    pub async fn calculate_discount(
        &self,
        promo_code: Option<&str>,
        _base_amount: Money,
    ) -> Result<Money, SagaError> {
        let Some(code) = promo_code else {
            return Ok(Money::zero());
        };
        match self.store.get_promo(code).await? {
            Some(promo) if promo.remaining_uses > 0 => Ok(promo.discount_amount),
            _ => Ok(Money::zero()),
        }
    }

    /// Consumes one use of the promo code for the order.
    ///
    /// The decrement and the `Applied` application record are one atomic
    /// unit inside the store.
    pub async fn reserve_promo_use(&self, order_id: OrderId, code: &str) -> Result<(), SagaError> {
        match self.store.apply_promo(order_id, code).await? {
            MutationOutcome::Applied => Ok(()),
            MutationOutcome::NotFound => Err(SagaError::PromoNotFound(code.to_string())),
            MutationOutcome::Exhausted => Err(SagaError::PromoExhausted(code.to_string())),
        }
    }

    /// Returns one use to the promo code and cancels the order's
    /// application. A missing promo is a no-op, so an orphan compensation
    /// never raises.
    pub async fn release_promo_use(&self, order_id: OrderId, code: &str) -> Result<(), SagaError> {
        self.store.cancel_promo(order_id, code).await?;
        Ok(())
    }
}
