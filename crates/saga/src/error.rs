//! Saga error types.

use common::{OrderId, UserId};
use domain::{Money, Sku};
use order_store::StoreError;
use thiserror::Error;

use crate::step::StepName;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Order is not in the expected state for the saga to act on it.
    #[error("Order {0} is no longer pending")]
    OrderNotPending(OrderId),

    /// Promo code does not exist.
    #[error("Promo code {0} not found")]
    PromoNotFound(String),

    /// Promo code has no remaining uses.
    #[error("Promo code {0} has no remaining uses")]
    PromoExhausted(String),

    /// Inventory item does not exist.
    #[error("Item {0} not found in inventory")]
    ItemNotFound(Sku),

    /// Not enough stock on hand for the requested quantity.
    #[error("Insufficient inventory for {sku}: requested {qty}")]
    InsufficientStock { sku: Sku, qty: u32 },

    /// User does not exist.
    #[error("User {0} not found")]
    UserNotFound(UserId),

    /// User balance cannot cover the amount.
    #[error("Insufficient balance for user {user_id}: required {required}")]
    InsufficientBalance { user_id: UserId, required: Money },

    /// Synthetic failure raised ahead of the named step, used to exercise
    /// compensation from the outside.
    #[error("Injected failure at step {0}")]
    InjectedFailure(StepName),

    /// Store error. Unlike business failures this does not trigger
    /// compensation; it propagates out of the saga.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SagaError {
    /// Returns true if this error must propagate instead of taking the
    /// mark-failed-and-compensate path.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SagaError::Store(_))
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
