//! Data model for the order saga system.
//!
//! This crate provides the entities that the saga engine mutates:
//! - `Order` with its Pending/Confirmed/Failed state machine
//! - the shared resources (`User`, `InventoryItem`, `PromoCode`)
//! - the side-effect records written next to each resource mutation
//!   (`PromoApplication`, `InventoryReservation`, `Payment`)
//! - the `SagaStepRecord` audit row tracing every forward and
//!   compensating action

pub mod audit;
pub mod money;
pub mod order;
pub mod resources;

pub use audit::{SagaStepRecord, StepId, StepStatus};
pub use money::Money;
pub use order::{Order, OrderStatus};
pub use resources::{
    ApplicationStatus, InventoryItem, InventoryReservation, Payment, PaymentStatus,
    PromoApplication, PromoCode, ReservationStatus, Sku, User,
};

use thiserror::Error;

/// Error raised when a status column holds text no enum variant matches.
#[derive(Debug, Clone, Error)]
#[error("unknown {kind} status: {value}")]
pub struct UnknownStatus {
    pub kind: &'static str,
    pub value: String,
}
