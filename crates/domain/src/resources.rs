//! Shared business resources and the side-effect records written next to
//! each resource mutation.

use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::UnknownStatus;
use crate::money::Money;

/// Stock-keeping unit identifying an inventory item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Creates a new SKU from a string.
    pub fn new(sku: impl Into<String>) -> Self {
        Self(sku.into())
    }

    /// Returns the SKU as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Sku {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Sku {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for Sku {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A user account holding a spendable balance.
///
/// The balance never goes negative; the store only debits it through a
/// conditional check-and-subtract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub balance: Money,
}

impl User {
    pub fn new(name: impl Into<String>, balance: Money) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            balance,
        }
    }
}

/// An item held in inventory. `on_hand` never goes negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub sku: Sku,
    pub name: String,
    pub price: Money,
    pub on_hand: u32,
}

impl InventoryItem {
    pub fn new(sku: impl Into<Sku>, name: impl Into<String>, price: Money, on_hand: u32) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            price,
            on_hand,
        }
    }
}

/// A promotional code with a bounded number of uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCode {
    pub code: String,
    pub remaining_uses: u32,
    pub discount_amount: Money,
}

impl PromoCode {
    pub fn new(code: impl Into<String>, remaining_uses: u32, discount_amount: Money) -> Self {
        Self {
            code: code.into(),
            remaining_uses,
            discount_amount,
        }
    }
}

/// Status of a promo application record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Applied,
    Cancelled,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "APPLIED",
            ApplicationStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPLIED" => Ok(ApplicationStatus::Applied),
            "CANCELLED" => Ok(ApplicationStatus::Cancelled),
            other => Err(UnknownStatus {
                kind: "promo application",
                value: other.to_string(),
            }),
        }
    }
}

/// Records that an order consumed one use of a promo code.
///
/// At most one `Applied` row exists per (order, code) pair at any time;
/// compensation flips it to `Cancelled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoApplication {
    pub id: Uuid,
    pub order_id: OrderId,
    pub code: String,
    pub status: ApplicationStatus,
}

/// Status of an inventory reservation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    Reserved,
    Released,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Reserved => "RESERVED",
            ReservationStatus::Released => "RELEASED",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RESERVED" => Ok(ReservationStatus::Reserved),
            "RELEASED" => Ok(ReservationStatus::Released),
            other => Err(UnknownStatus {
                kind: "reservation",
                value: other.to_string(),
            }),
        }
    }
}

/// Records stock taken out of inventory for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryReservation {
    pub id: Uuid,
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
    pub status: ReservationStatus,
}

/// Status of a payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Charged,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Charged => "CHARGED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CHARGED" => Ok(PaymentStatus::Charged),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(UnknownStatus {
                kind: "payment",
                value: other.to_string(),
            }),
        }
    }
}

/// Records a balance debit taken for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub status: PaymentStatus,
}
