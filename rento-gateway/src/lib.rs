pub mod payway;
pub mod sandbox;
pub mod signing;

use rento_core::payment::{GatewayError, PaymentGateway};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub use payway::PaywayGateway;
pub use sandbox::SandboxGateway;

/// Which adapter backs the `PaymentGateway` capability
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    Payway,
    #[default]
    Sandbox,
}

#[derive(Debug, Clone)]
pub struct PaywayConfig {
    pub base_url: String,
    pub merchant_id: String,
    pub api_key: String,
    pub merchant_auth: String,
    /// Public base URL of this service, for gateway callbacks
    pub callback_url: String,
    /// Public base URL of the web app, for checkout return links
    pub app_url: String,
    pub timeout: Duration,
}

/// Pick the adapter named by configuration.
pub fn build_gateway(
    kind: GatewayKind,
    config: PaywayConfig,
) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
    let gateway: Arc<dyn PaymentGateway> = match kind {
        GatewayKind::Payway => Arc::new(PaywayGateway::new(config)?),
        GatewayKind::Sandbox => Arc::new(SandboxGateway::new(config.api_key)),
    };
    tracing::info!("Payment gateway: {}", gateway.name());
    Ok(gateway)
}
