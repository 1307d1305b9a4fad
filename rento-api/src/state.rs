use rento_booking::BookingOrchestrator;
use rento_core::identity::IdentityProvider;
use rento_core::rate_limit::RateLimitStore;
use std::sync::Arc;
use std::time::Duration;

use crate::metrics::Metrics;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window: Duration,
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<BookingOrchestrator>,
    pub identity: Arc<dyn IdentityProvider>,
    pub rate_limiter: Arc<dyn RateLimitStore>,
    pub rate_limit: RateLimitSettings,
    pub metrics: Arc<Metrics>,
    /// Hides internal error details from responses
    pub production: bool,
}
