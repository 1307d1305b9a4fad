use async_trait::async_trait;
use rento_shared::{BookingTransitionedEvent, PaymentReconciliationEvent};

/// Outbound domain events. Publishing is best-effort: implementations log
/// their own failures and never surface them to the caller.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn reconciliation_required(&self, event: &PaymentReconciliationEvent);

    async fn booking_transitioned(&self, event: &BookingTransitionedEvent);
}

/// Writes events to the tracing pipeline only.
#[derive(Debug, Default, Clone)]
pub struct LogEventSink;

#[async_trait]
impl EventSink for LogEventSink {
    async fn reconciliation_required(&self, event: &PaymentReconciliationEvent) {
        tracing::warn!(
            booking_id = %event.booking_id,
            operation = %event.operation,
            external_id = event.external_id.as_deref().unwrap_or(""),
            reason = %event.reason,
            "payment reconciliation required"
        );
    }

    async fn booking_transitioned(&self, event: &BookingTransitionedEvent) {
        tracing::debug!(
            booking_id = %event.booking_id,
            from = %event.from,
            to = %event.to,
            "booking transitioned"
        );
    }
}
