//! Shared types for the order saga system.

pub mod types;

pub use types::{OrderId, UserId};
