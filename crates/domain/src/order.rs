//! Order entity and its status state machine.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::UnknownStatus;
use crate::money::Money;
use crate::resources::Sku;

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──┬──► Confirmed
///           └──► Failed
/// ```
///
/// Both `Confirmed` and `Failed` are terminal; a terminal order never
/// moves again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order has been accepted by intake; the saga has not finished.
    #[default]
    Pending,

    /// Every forward step committed (terminal state).
    Confirmed,

    /// A step failed and compensation ran (terminal state).
    Failed,
}

impl OrderStatus {
    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Failed)
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "FAILED" => Ok(OrderStatus::Failed),
            other => Err(UnknownStatus {
                kind: "order",
                value: other.to_string(),
            }),
        }
    }
}

/// An order placement request as persisted by intake.
///
/// Amounts are computed by intake before the order is stored:
/// `final_amount = base_amount - discount_amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub sku: Sku,
    pub qty: u32,
    pub promo_code: Option<String>,
    pub base_amount: Money,
    pub discount_amount: Money,
    pub final_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new `Pending` order with a fresh ID, stamped now.
    pub fn pending(
        user_id: UserId,
        sku: Sku,
        qty: u32,
        promo_code: Option<String>,
        base_amount: Money,
        discount_amount: Money,
    ) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            sku,
            qty,
            promo_code,
            base_amount,
            discount_amount,
            final_amount: base_amount - discount_amount,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Returns the promo code, if one was supplied with the order.
    pub fn promo_code(&self) -> Option<&str> {
        self.promo_code.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Confirmed.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(OrderStatus::Pending.to_string(), "PENDING");
        assert_eq!(OrderStatus::Confirmed.to_string(), "CONFIRMED");
        assert_eq!(OrderStatus::Failed.to_string(), "FAILED");
    }

    #[test]
    fn test_parse_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("SHIPPED".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_pending_order_computes_final_amount() {
        let order = Order::pending(
            UserId::new(),
            Sku::new("ITEM001"),
            2,
            Some("DISCOUNT10".to_string()),
            Money::from_cents(20000),
            Money::from_cents(1000),
        );

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.final_amount, Money::from_cents(19000));
        assert_eq!(order.promo_code(), Some("DISCOUNT10"));
    }

    #[test]
    fn test_order_serialization_roundtrip() {
        let order = Order::pending(
            UserId::new(),
            Sku::new("ITEM001"),
            1,
            None,
            Money::from_cents(10000),
            Money::zero(),
        );
        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, deserialized);
    }
}
