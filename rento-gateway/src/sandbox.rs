use async_trait::async_trait;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rento_core::payment::{
    CancelResult, CaptureResult, GatewayError, PaymentGateway, PreAuthRequest, PreAuthResult,
    RefundResult, TransactionCheck,
};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::signing::verify_callback;

/// Offline stand-in for PayWay. Every call succeeds without touching the network.
pub struct SandboxGateway {
    api_key: String,
}

impl SandboxGateway {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }

    fn mock_tran_id() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(|c| char::from(c).to_ascii_uppercase())
            .collect();
        format!("MOCK{}{}", Utc::now().timestamp_millis(), suffix)
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    fn name(&self) -> &'static str {
        "sandbox"
    }

    async fn create_pre_auth(&self, request: &PreAuthRequest) -> Result<PreAuthResult, GatewayError> {
        let tran_id = Self::mock_tran_id();
        tracing::info!(
            booking_id = %request.booking_id,
            tran_id = %tran_id,
            amount = request.amount,
            "Sandbox pre-auth created"
        );
        Ok(PreAuthResult {
            checkout_reference: format!("/mock-payment?tran_id={}&status=pending", tran_id),
            external_transaction_id: tran_id,
        })
    }

    async fn capture_with_payout(&self, external_id: &str) -> Result<CaptureResult, GatewayError> {
        tracing::info!(tran_id = %external_id, "Sandbox capture");
        Ok(CaptureResult {
            grand_total: Decimal::ZERO,
            gateway_status: "captured".to_string(),
        })
    }

    async fn cancel_pre_auth(&self, external_id: &str) -> Result<CancelResult, GatewayError> {
        tracing::info!(tran_id = %external_id, "Sandbox cancel");
        Ok(CancelResult {
            gateway_status: "cancelled".to_string(),
        })
    }

    async fn refund_payment(&self, external_id: &str) -> Result<RefundResult, GatewayError> {
        tracing::info!(tran_id = %external_id, "Sandbox refund");
        Ok(RefundResult {
            total_refunded: Decimal::ZERO,
            gateway_status: "refunded".to_string(),
        })
    }

    async fn check_transaction(&self, _external_id: &str) -> Result<TransactionCheck, GatewayError> {
        Ok(TransactionCheck {
            payment_status: "pending".to_string(),
            amount: Decimal::ZERO,
            currency: "USD".to_string(),
        })
    }

    fn verify_callback_signature(&self, payload: &Map<String, Value>) -> bool {
        verify_callback(&self.api_key, payload)
    }
}
