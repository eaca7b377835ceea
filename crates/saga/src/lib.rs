//! Saga engine for order placement.
//!
//! An order touches several independently-owned pieces of state: promo
//! usage counters, inventory stock, and user balances. No single
//! transaction spans them all, so the order is committed or rejected as
//! a whole by a saga: a forward sequence of local mutations, each with a
//! matching compensating action executed in reverse on failure.
//!
//! The forward steps, in order:
//! 1. Reserve a promo use (only when the order carries a promo code)
//! 2. Reserve inventory
//! 3. Charge the user balance
//! 4. Finalize the order (Pending -> Confirmed)
//!
//! Every step attempt and every compensation is recorded in a durable
//! audit trail.

pub mod error;
pub mod orchestrator;
pub mod services;
pub mod step;

pub use error::SagaError;
pub use orchestrator::SagaOrchestrator;
pub use services::{Billing, Discounts, Inventory};
pub use step::{SagaStep, StepName, UnknownStep};
