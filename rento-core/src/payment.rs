use async_trait::async_trait;
use rento_shared::Masked;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use uuid::Uuid;

use crate::CoreError;

/// Everything the gateway needs to open a hold for one booking.
#[derive(Debug, Clone, Serialize)]
pub struct PreAuthRequest {
    pub booking_id: Uuid,
    pub listing_title: String,
    pub renter_first_name: String,
    pub renter_last_name: String,
    pub renter_email: Masked<String>,
    pub renter_phone: Masked<String>,
    pub owner_id: Uuid,
    pub owner_beneficiary_id: Masked<String>,
    /// Total renter pays, minor units
    pub amount: i64,
    /// Owner payout, minor units
    pub owner_payout: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreAuthResult {
    pub external_transaction_id: String,
    /// Opaque reference the client uses to finish checkout
    pub checkout_reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureResult {
    pub grand_total: Decimal,
    pub gateway_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancelResult {
    pub gateway_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundResult {
    pub total_refunded: Decimal,
    pub gateway_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionCheck {
    pub payment_status: String,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("gateway rejected request with code {code}: {message}")]
    Rejected { code: String, message: String },
    #[error("gateway transport error: {0}")]
    Transport(String),
    #[error("gateway call timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected gateway response: {0}")]
    Decode(String),
}

impl From<GatewayError> for CoreError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected { .. } => CoreError::Payment(err.to_string()),
            other => CoreError::ExternalService(other.to_string()),
        }
    }
}

/// Capability set shared by the live PayWay adapter and the sandbox.
///
/// Implementations are stateless and do not retry; callers decide what a
/// failure means for them.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open a hold for the renter's total with a payout instruction for the owner
    async fn create_pre_auth(&self, request: &PreAuthRequest) -> Result<PreAuthResult, GatewayError>;

    /// Turn a hold into a charge and pay the owner out
    async fn capture_with_payout(&self, external_id: &str) -> Result<CaptureResult, GatewayError>;

    /// Release a hold without charging
    async fn cancel_pre_auth(&self, external_id: &str) -> Result<CancelResult, GatewayError>;

    /// Reverse a completed charge
    async fn refund_payment(&self, external_id: &str) -> Result<RefundResult, GatewayError>;

    /// Read-only status query
    async fn check_transaction(&self, external_id: &str) -> Result<TransactionCheck, GatewayError>;

    /// Authenticate an inbound callback body before its content is trusted
    fn verify_callback_signature(&self, payload: &Map<String, Value>) -> bool;
}
