//! Durable audit trail of saga step outcomes.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::UnknownStatus;

/// Unique identifier for a saga step audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(Uuid);

impl StepId {
    /// Creates a new random step ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a step ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for StepId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a single audit row.
///
/// A row is inserted as `Started` and moves exactly once, to a terminal
/// status. Compensation outcomes are recorded as separate rows named
/// `Compensate_<step>`, inserted already `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepStatus {
    Started,
    Completed,
    Failed,
    Compensated,
}

impl StepStatus {
    /// Returns true if this is a terminal status for an audit row.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepStatus::Started)
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Started => "STARTED",
            StepStatus::Completed => "COMPLETED",
            StepStatus::Failed => "FAILED",
            StepStatus::Compensated => "COMPENSATED",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StepStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STARTED" => Ok(StepStatus::Started),
            "COMPLETED" => Ok(StepStatus::Completed),
            "FAILED" => Ok(StepStatus::Failed),
            "COMPENSATED" => Ok(StepStatus::Compensated),
            other => Err(UnknownStatus {
                kind: "step",
                value: other.to_string(),
            }),
        }
    }
}

/// One audit row: a forward step attempt or a compensation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaStepRecord {
    pub id: StepId,
    pub order_id: OrderId,
    pub step_name: String,
    pub status: StepStatus,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SagaStepRecord {
    /// Creates a fresh `Started` row stamped now.
    pub fn started(order_id: OrderId, step_name: impl Into<String>) -> Self {
        Self {
            id: StepId::new(),
            order_id,
            step_name: step_name.into(),
            status: StepStatus::Started,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Creates a row born `Completed`, used for compensation records.
    pub fn finished(order_id: OrderId, step_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: StepId::new(),
            order_id,
            step_name: step_name.into(),
            status: StepStatus::Completed,
            error: None,
            started_at: now,
            finished_at: Some(now),
        }
    }

    /// Returns true if this row records a compensating action.
    pub fn is_compensation(&self) -> bool {
        self.step_name.starts_with("Compensate_")
    }
}
