//! Saga step framework.
//!
//! A step is a unit of forward work with a matching compensating action.
//! The `run` wrapper gives every step the same audit protocol: a durable
//! `Started` row before anything executes, then exactly one terminal
//! update. `run_compensation` records successful compensations as
//! `Compensate_<name>` rows and never re-raises.

use common::{OrderId, UserId};
use domain::{Money, Order, OrderStatus, SagaStepRecord, Sku};
use order_store::SagaStore;
use thiserror::Error;

use crate::error::SagaError;
use crate::services::{Billing, Discounts, Inventory};

/// Name of a forward saga step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepName {
    ReservePromoUse,
    ReserveInventory,
    ChargeUserBalance,
    FinalizeOrder,
}

impl StepName {
    /// Returns the step name as recorded in the audit trail.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::ReservePromoUse => "ReservePromoUse",
            StepName::ReserveInventory => "ReserveInventory",
            StepName::ChargeUserBalance => "ChargeUserBalance",
            StepName::FinalizeOrder => "FinalizeOrder",
        }
    }

    /// Returns the audit label for this step's compensation record.
    pub fn compensation_label(&self) -> String {
        format!("Compensate_{}", self.as_str())
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error raised when parsing an unknown step name.
#[derive(Debug, Clone, Error)]
#[error("unknown saga step: {0}")]
pub struct UnknownStep(pub String);

impl std::str::FromStr for StepName {
    type Err = UnknownStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ReservePromoUse" => Ok(StepName::ReservePromoUse),
            "ReserveInventory" => Ok(StepName::ReserveInventory),
            "ChargeUserBalance" => Ok(StepName::ChargeUserBalance),
            "FinalizeOrder" => Ok(StepName::FinalizeOrder),
            other => Err(UnknownStep(other.to_string())),
        }
    }
}

/// The store handle and resource services a step executes against.
pub(crate) struct StepContext<S> {
    pub store: S,
    pub discounts: Discounts<S>,
    pub inventory: Inventory<S>,
    pub billing: Billing<S>,
}

/// A forward saga step with its compensating action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaStep {
    ReservePromoUse { code: String },
    ReserveInventory { sku: Sku, qty: u32 },
    ChargeUserBalance { user_id: UserId, amount: Money },
    FinalizeOrder,
}

impl SagaStep {
    /// Builds the ordered forward step list for an order.
    ///
    /// The promo step is included only when the order carries a promo
    /// code; the rest of the sequence is fixed.
    pub fn for_order(order: &Order) -> Vec<SagaStep> {
        let mut steps = Vec::with_capacity(4);
        if let Some(code) = order.promo_code() {
            steps.push(SagaStep::ReservePromoUse {
                code: code.to_string(),
            });
        }
        steps.push(SagaStep::ReserveInventory {
            sku: order.sku.clone(),
            qty: order.qty,
        });
        steps.push(SagaStep::ChargeUserBalance {
            user_id: order.user_id,
            amount: order.final_amount,
        });
        steps.push(SagaStep::FinalizeOrder);
        steps
    }

    /// Returns the name of this step.
    pub fn name(&self) -> StepName {
        match self {
            SagaStep::ReservePromoUse { .. } => StepName::ReservePromoUse,
            SagaStep::ReserveInventory { .. } => StepName::ReserveInventory,
            SagaStep::ChargeUserBalance { .. } => StepName::ChargeUserBalance,
            SagaStep::FinalizeOrder => StepName::FinalizeOrder,
        }
    }

    async fn execute<S: SagaStore>(
        &self,
        order_id: OrderId,
        ctx: &StepContext<S>,
    ) -> Result<(), SagaError> {
        match self {
            SagaStep::ReservePromoUse { code } => {
                ctx.discounts.reserve_promo_use(order_id, code).await
            }
            SagaStep::ReserveInventory { sku, qty } => {
                ctx.inventory.reserve_inventory(order_id, sku, *qty).await
            }
            SagaStep::ChargeUserBalance { user_id, amount } => {
                ctx.billing
                    .charge_user_balance(order_id, *user_id, *amount)
                    .await
            }
            SagaStep::FinalizeOrder => {
                let moved = ctx
                    .store
                    .transition_order(order_id, OrderStatus::Confirmed)
                    .await?;
                if moved {
                    Ok(())
                } else {
                    Err(SagaError::OrderNotPending(order_id))
                }
            }
        }
    }

    async fn compensate<S: SagaStore>(
        &self,
        order_id: OrderId,
        ctx: &StepContext<S>,
    ) -> Result<(), SagaError> {
        match self {
            SagaStep::ReservePromoUse { code } => {
                ctx.discounts.release_promo_use(order_id, code).await
            }
            SagaStep::ReserveInventory { sku, qty } => {
                ctx.inventory.release_inventory(order_id, sku, *qty).await
            }
            SagaStep::ChargeUserBalance { user_id, amount } => {
                ctx.billing
                    .refund_payment(order_id, *user_id, *amount)
                    .await
            }
            // Last forward step; the failed transition left nothing to undo.
            SagaStep::FinalizeOrder => Ok(()),
        }
    }

    /// Forward protocol: a durable `Started` audit row, then `execute`,
    /// then exactly one terminal update on that row.
    ///
    /// Audit writes that fail are store errors and propagate.
    pub(crate) async fn run<S: SagaStore>(
        &self,
        order_id: OrderId,
        ctx: &StepContext<S>,
    ) -> Result<(), SagaError> {
        let record = SagaStepRecord::started(order_id, self.name().as_str());
        ctx.store.insert_step(&record).await?;
        tracing::info!(step = %self.name(), %order_id, "executing saga step");

        match self.execute(order_id, ctx).await {
            Ok(()) => {
                ctx.store.complete_step(record.id).await?;
                tracing::info!(step = %self.name(), %order_id, "saga step completed");
                Ok(())
            }
            Err(err) => {
                ctx.store.fail_step(record.id, &err.to_string()).await?;
                tracing::error!(step = %self.name(), %order_id, error = %err, "saga step failed");
                Err(err)
            }
        }
    }

    /// Compensation protocol: best-effort. A successful compensation is
    /// recorded as a `Compensate_<name>` row; any failure, business or
    /// store, is logged and swallowed so the remaining compensations
    /// still run.
    pub(crate) async fn run_compensation<S: SagaStore>(
        &self,
        order_id: OrderId,
        ctx: &StepContext<S>,
    ) {
        let label = self.name().compensation_label();
        tracing::info!(step = %label, %order_id, "compensating saga step");

        match self.compensate(order_id, ctx).await {
            Ok(()) => {
                let record = SagaStepRecord::finished(order_id, label.as_str());
                match ctx.store.insert_step(&record).await {
                    Ok(()) => {
                        tracing::info!(step = %label, %order_id, "compensation completed");
                    }
                    Err(err) => {
                        tracing::error!(step = %label, %order_id, error = %err, "failed to record compensation");
                    }
                }
            }
            Err(err) => {
                tracing::error!(step = %label, %order_id, error = %err, "compensation failed, continuing");
            }
        }
    }
}
