//! Saga orchestrator driving forward execution and compensation.

use common::OrderId;
use domain::{OrderStatus, SagaStepRecord};
use order_store::SagaStore;

use crate::error::SagaError;
use crate::services::{Billing, Discounts, Inventory};
use crate::step::{SagaStep, StepContext, StepName};

/// Orchestrates the execution of order placement sagas.
///
/// For each order the orchestrator assembles the ordered step list,
/// drives forward execution, and on any business failure marks the order
/// `FAILED` and compensates already-completed steps in reverse order.
pub struct SagaOrchestrator<S> {
    ctx: StepContext<S>,
}

impl<S: SagaStore + Clone> SagaOrchestrator<S> {
    /// Creates a new orchestrator over the given store.
    pub fn new(store: S) -> Self {
        Self {
            ctx: StepContext {
                discounts: Discounts::new(store.clone()),
                inventory: Inventory::new(store.clone()),
                billing: Billing::new(store.clone()),
                store,
            },
        }
    }

    /// Runs the saga for an order to a terminal outcome.
    ///
    /// Returns `Ok(true)` when every forward step committed and the order
    /// is `CONFIRMED`, `Ok(false)` when a step failed and compensation
    /// ran. When `fail_at_step` names the upcoming step, a synthetic
    /// failure is raised before that step executes; this is part of the
    /// contract so compensation is externally testable.
    ///
    /// Store errors propagate as `Err` without compensation; the order
    /// may then remain `PENDING`.
    #[tracing::instrument(skip(self), fields(saga = "OrderPlacement"))]
    pub async fn execute(
        &self,
        order_id: OrderId,
        fail_at_step: Option<StepName>,
    ) -> Result<bool, SagaError> {
        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = std::time::Instant::now();

        let order = self
            .ctx
            .store
            .get_order(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))?;

        tracing::info!(%order_id, "starting saga");
        let steps = SagaStep::for_order(&order);

        let mut completed: Vec<&SagaStep> = Vec::new();
        let mut failure: Option<SagaError> = None;

        for step in &steps {
            if fail_at_step == Some(step.name()) {
                failure = Some(SagaError::InjectedFailure(step.name()));
                break;
            }
            match step.run(order_id, &self.ctx).await {
                Ok(()) => completed.push(step),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        let outcome = match failure {
            None => {
                metrics::counter!("saga_completed").increment(1);
                tracing::info!(%order_id, "saga completed");
                true
            }
            Some(cause) => {
                self.fail_and_compensate(order_id, &completed, &cause)
                    .await?;
                metrics::counter!("saga_failed").increment(1);
                false
            }
        };

        metrics::histogram!("saga_duration_seconds").record(saga_start.elapsed().as_secs_f64());
        Ok(outcome)
    }

    /// Marks the order `FAILED`, then runs compensating actions over the
    /// completed steps in reverse order. Each compensation is
    /// best-effort; an individual failure never stops the chain.
    async fn fail_and_compensate(
        &self,
        order_id: OrderId,
        completed: &[&SagaStep],
        cause: &SagaError,
    ) -> Result<(), SagaError> {
        tracing::error!(%order_id, error = %cause, "saga failed");

        self.ctx
            .store
            .transition_order(order_id, OrderStatus::Failed)
            .await?;

        if !completed.is_empty() {
            tracing::info!(%order_id, steps = completed.len(), "starting compensation");
        }
        for step in completed.iter().rev() {
            step.run_compensation(order_id, &self.ctx).await;
        }
        if !completed.is_empty() {
            tracing::info!(%order_id, "compensation finished");
        }
        Ok(())
    }

    /// Returns the persisted audit trail for an order, ordered by
    /// `started_at`.
    pub async fn audit_trail(&self, order_id: OrderId) -> Result<Vec<SagaStepRecord>, SagaError> {
        Ok(self.ctx.store.steps_for_order(order_id).await?)
    }
}
