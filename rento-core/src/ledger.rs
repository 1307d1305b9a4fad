use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    PreAuth,
    Capture,
    Payout,
    Refund,
    PartialRefund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::PreAuth => "pre_auth",
            TransactionType::Capture => "capture",
            TransactionType::Payout => "payout",
            TransactionType::Refund => "refund",
            TransactionType::PartialRefund => "partial_refund",
        }
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre_auth" => Ok(TransactionType::PreAuth),
            "capture" => Ok(TransactionType::Capture),
            "payout" => Ok(TransactionType::Payout),
            "refund" => Ok(TransactionType::Refund),
            "partial_refund" => Ok(TransactionType::PartialRefund),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Authorized,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Authorized => "authorized",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "authorized" => Ok(TransactionStatus::Authorized),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            "refunded" => Ok(TransactionStatus::Refunded),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

/// Ledger record for one gateway operation. Updated in place as the gateway
/// confirms outcomes; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub booking_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub status: TransactionStatus,
    pub amount: i64,
    pub currency: String,
    pub external_id: Option<String>,
    pub gateway_status: Option<String>,
    pub metadata: serde_json::Value,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn from_new(new: &NewLedgerEntry, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id: new.booking_id,
            kind: new.kind,
            status: new.status,
            amount: new.amount,
            currency: new.currency.clone(),
            external_id: new.external_id.clone(),
            gateway_status: None,
            metadata: serde_json::json!({}),
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub booking_id: Uuid,
    pub kind: TransactionType,
    pub status: TransactionStatus,
    pub amount: i64,
    pub currency: String,
    pub external_id: Option<String>,
}

/// Partial update keyed by the gateway transaction id. `None` fields are left
/// untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerUpdate {
    pub status: TransactionStatus,
    pub gateway_status: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl LedgerUpdate {
    /// Outcome confirmed synchronously by a gateway call.
    pub fn processed(status: TransactionStatus, gateway_status: Option<String>) -> Self {
        Self {
            status,
            gateway_status,
            metadata: None,
            processed_at: Some(Utc::now()),
        }
    }

    /// Outcome reported by an inbound callback.
    pub fn from_callback(status: TransactionStatus, gateway_status: &str, payload: serde_json::Value) -> Self {
        Self {
            status,
            gateway_status: Some(gateway_status.to_string()),
            metadata: Some(serde_json::json!({ "payway_callback": payload })),
            processed_at: None,
        }
    }

    pub fn apply(&self, entry: &mut LedgerEntry, now: DateTime<Utc>) {
        entry.status = self.status;
        if let Some(gateway_status) = &self.gateway_status {
            entry.gateway_status = Some(gateway_status.clone());
        }
        if let Some(metadata) = &self.metadata {
            entry.metadata = metadata.clone();
        }
        if let Some(processed_at) = self.processed_at {
            entry.processed_at = Some(processed_at);
        }
        entry.updated_at = now;
    }
}
