use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use rento_core::payment::{
    CancelResult, CaptureResult, GatewayError, PaymentGateway, PreAuthRequest, PreAuthResult,
    RefundResult, TransactionCheck,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::signing::{request_time, sign, verify_callback};
use crate::PaywayConfig;

const PURCHASE_PATH: &str = "/api/payment-gateway/v1/payments/purchase";
const CHECK_PATH: &str = "/api/payment-gateway/v1/payments/check-transaction-2";
const CAPTURE_PATH: &str =
    "/api/merchant-portal/merchant-access/online-transaction/pre-auth-completion";
const CANCEL_PATH: &str =
    "/api/merchant-portal/merchant-access/online-transaction/cancel-pre-purchase";
const REFUND_PATH: &str = "/api/merchant-portal/merchant-access/online-transaction/refund";

const CALLBACK_PATH: &str = "/v1/payments/payway-callback";
const SUCCESS_CODE: &str = "00";
const PRE_AUTH_TYPE: &str = "pre-auth";
const PAYMENT_OPTION: &str = "abapay_khqr";
/// Minutes the checkout stays open
const CHECKOUT_LIFETIME: u32 = 30;

#[derive(Debug, Deserialize)]
struct GatewayStatus {
    code: String,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MerchantResponse {
    status: Option<GatewayStatus>,
    grand_total: Option<Decimal>,
    total_refunded: Option<Decimal>,
    transaction_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    status: Option<GatewayStatus>,
    data: Option<CheckData>,
}

#[derive(Debug, Deserialize)]
struct CheckData {
    payment_status: Option<String>,
    amount: Option<Decimal>,
    currency: Option<String>,
}

/// Live ABA PayWay adapter.
pub struct PaywayGateway {
    client: reqwest::Client,
    config: PaywayConfig,
}

impl PaywayGateway {
    pub fn new(config: PaywayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Gateway-side id for a booking: `RNT` + first 12 hex digits of the booking id
    pub fn tran_id_for(booking_id: Uuid) -> String {
        let simple = booking_id.simple().to_string();
        format!("RNT{}", &simple[..12])
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response, GatewayError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn transport_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.config.timeout)
        } else {
            GatewayError::Transport(err.to_string())
        }
    }

    /// Capture, cancel and refund share one request shape and hash.
    async fn merchant_call(&self, path: &str, tran_id: &str) -> Result<MerchantResponse, GatewayError> {
        let req_time = request_time(Utc::now());
        let hash = sign(
            &self.config.api_key,
            &format!("{}{}{}", req_time, self.config.merchant_id, tran_id),
        );
        let body = json!({
            "request_time": req_time,
            "merchant_id": self.config.merchant_id,
            "merchant_auth": self.config.merchant_auth,
            "tran_id": tran_id,
            "hash": hash,
        });

        let response: MerchantResponse = self
            .post(path, &body)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        ensure_success(response.status.as_ref())?;
        Ok(response)
    }
}

fn ensure_success(status: Option<&GatewayStatus>) -> Result<(), GatewayError> {
    match status {
        Some(status) if status.code == SUCCESS_CODE => Ok(()),
        Some(status) => Err(GatewayError::Rejected {
            code: status.code.clone(),
            message: status.message.clone().unwrap_or_else(|| "Unknown error".to_string()),
        }),
        None => Err(GatewayError::Decode("response has no status".to_string())),
    }
}

/// `9400` minor units -> `"94.00"`
fn major_units(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[async_trait]
impl PaymentGateway for PaywayGateway {
    fn name(&self) -> &'static str {
        "payway"
    }

    async fn create_pre_auth(&self, request: &PreAuthRequest) -> Result<PreAuthResult, GatewayError> {
        let b64 = base64::engine::general_purpose::STANDARD;
        let tran_id = Self::tran_id_for(request.booking_id);
        let req_time = request_time(Utc::now());

        let items = b64.encode(
            json!([{
                "name": format!("Rental: {}", request.listing_title),
                "quantity": 1,
                "price": request.amount,
            }])
            .to_string(),
        );
        let callback_url = b64.encode(format!(
            "{}{}",
            self.config.callback_url.trim_end_matches('/'),
            CALLBACK_PATH
        ));
        let payout = json!([{
            "acc": request.owner_beneficiary_id.expose(),
            "amt": major_units(request.owner_payout),
        }])
        .to_string();
        let custom_fields = json!({
            "booking_id": request.booking_id,
            "owner_id": request.owner_id,
        })
        .to_string();

        let hash = sign(
            &self.config.api_key,
            &format!(
                "{}{}{}{}{}{}",
                req_time, self.config.merchant_id, tran_id, request.amount, items, PRE_AUTH_TYPE
            ),
        );
        let app_url = self.config.app_url.trim_end_matches('/');

        let body = json!({
            "req_time": req_time,
            "merchant_id": self.config.merchant_id,
            "tran_id": tran_id,
            "firstname": request.renter_first_name,
            "lastname": request.renter_last_name,
            "email": request.renter_email,
            "phone": request.renter_phone,
            "amount": request.amount,
            "currency": request.currency,
            "type": PRE_AUTH_TYPE,
            "payment_option": PAYMENT_OPTION,
            "items": items,
            "callback_url": callback_url,
            "return_url": format!("{}/bookings/{}/payment-result", app_url, request.booking_id),
            "cancel_url": format!("{}/bookings/{}", app_url, request.booking_id),
            "lifetime": CHECKOUT_LIFETIME,
            "custom_fields": custom_fields,
            "payout": payout,
            "hash": hash,
        });

        let checkout = self
            .post(PURCHASE_PATH, &body)
            .await?
            .text()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        tracing::debug!(booking_id = %request.booking_id, tran_id = %tran_id, "PayWay pre-auth opened");

        Ok(PreAuthResult {
            external_transaction_id: tran_id,
            checkout_reference: checkout,
        })
    }

    async fn capture_with_payout(&self, external_id: &str) -> Result<CaptureResult, GatewayError> {
        let response = self.merchant_call(CAPTURE_PATH, external_id).await?;
        Ok(CaptureResult {
            grand_total: response.grand_total.unwrap_or_default(),
            gateway_status: response.transaction_status.unwrap_or_default(),
        })
    }

    async fn cancel_pre_auth(&self, external_id: &str) -> Result<CancelResult, GatewayError> {
        let response = self.merchant_call(CANCEL_PATH, external_id).await?;
        Ok(CancelResult {
            gateway_status: response.transaction_status.unwrap_or_default(),
        })
    }

    async fn refund_payment(&self, external_id: &str) -> Result<RefundResult, GatewayError> {
        let response = self.merchant_call(REFUND_PATH, external_id).await?;
        Ok(RefundResult {
            total_refunded: response.total_refunded.unwrap_or_default(),
            gateway_status: response.transaction_status.unwrap_or_default(),
        })
    }

    async fn check_transaction(&self, external_id: &str) -> Result<TransactionCheck, GatewayError> {
        let req_time = request_time(Utc::now());
        let hash = sign(
            &self.config.api_key,
            &format!("{}{}{}", req_time, self.config.merchant_id, external_id),
        );
        let body = json!({
            "req_time": req_time,
            "merchant_id": self.config.merchant_id,
            "tran_id": external_id,
            "hash": hash,
        });

        let response: CheckResponse = self
            .post(CHECK_PATH, &body)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        if response.status.is_some() {
            ensure_success(response.status.as_ref())?;
        }

        let data = response.data;
        Ok(TransactionCheck {
            payment_status: data
                .as_ref()
                .and_then(|d| d.payment_status.clone())
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            amount: data.as_ref().and_then(|d| d.amount).unwrap_or_default(),
            currency: data
                .and_then(|d| d.currency)
                .unwrap_or_else(|| "USD".to_string()),
        })
    }

    fn verify_callback_signature(&self, payload: &Map<String, Value>) -> bool {
        verify_callback(&self.config.api_key, payload)
    }
}
