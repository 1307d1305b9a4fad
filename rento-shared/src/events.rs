use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Gateway call that a booking transition depends on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOperation {
    PreAuth,
    Capture,
    Cancel,
    Refund,
}

impl PaymentOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOperation::PreAuth => "pre_auth",
            PaymentOperation::Capture => "capture",
            PaymentOperation::Cancel => "cancel",
            PaymentOperation::Refund => "refund",
        }
    }
}

impl fmt::Display for PaymentOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted whenever a gateway call failed but the booking change was committed
/// anyway. Consumers use it to reconcile ledger state out of band.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentReconciliationEvent {
    pub booking_id: Uuid,
    pub operation: PaymentOperation,
    pub external_id: Option<String>,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

impl PaymentReconciliationEvent {
    pub fn new(
        booking_id: Uuid,
        operation: PaymentOperation,
        external_id: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            booking_id,
            operation,
            external_id,
            reason: reason.into(),
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingTransitionedEvent {
    pub booking_id: Uuid,
    pub from: String,
    pub to: String,
    pub actor_id: Option<Uuid>,
    pub timestamp: i64,
}
