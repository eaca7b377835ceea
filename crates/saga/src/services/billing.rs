//! User balance charges and refunds.

use common::{OrderId, UserId};
use domain::Money;
use order_store::{MutationOutcome, SagaStore};

use crate::error::SagaError;

/// Service owning the user balance resource.
pub struct Billing<S> {
    store: S,
}

impl<S: SagaStore> Billing<S> {
    /// Creates a new billing service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Debits the user's balance for the order. The debit and the
    /// `Charged` payment record are one atomic unit inside the store.
    pub async fn charge_user_balance(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
    ) -> Result<(), SagaError> {
        match self.store.debit_balance(order_id, user_id, amount).await? {
            MutationOutcome::Applied => Ok(()),
            MutationOutcome::NotFound => Err(SagaError::UserNotFound(user_id)),
            MutationOutcome::Exhausted => Err(SagaError::InsufficientBalance {
                user_id,
                required: amount,
            }),
        }
    }

    /// Credits the amount back and refunds the order's payment. A
    /// missing user is a no-op, so an orphan compensation never raises.
    pub async fn refund_payment(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
    ) -> Result<(), SagaError> {
        self.store.credit_balance(order_id, user_id, amount).await?;
        Ok(())
    }
}
