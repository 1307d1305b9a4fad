use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use rento_core::events::EventSink;
use rento_shared::{BookingTransitionedEvent, PaymentReconciliationEvent};
use std::sync::Arc;
use tracing::error;

use crate::state::AppState;

pub struct Metrics {
    registry: Registry,
    reconciliations: IntCounterVec,
    transitions: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconciliations = IntCounterVec::new(
            Opts::new(
                "rento_payment_reconciliation_total",
                "Payment calls that failed after the booking change was committed",
            ),
            &["operation"],
        )?;
        let transitions = IntCounterVec::new(
            Opts::new("rento_booking_transitions_total", "Committed booking status changes"),
            &["to"],
        )?;

        registry.register(Box::new(reconciliations.clone()))?;
        registry.register(Box::new(transitions.clone()))?;

        Ok(Self {
            registry,
            reconciliations,
            transitions,
        })
    }

    pub fn reconciliation_count(&self, operation: &str) -> u64 {
        self.reconciliations.with_label_values(&[operation]).get()
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Counts events, then hands them to the wrapped sink.
pub struct MetricsEventSink {
    metrics: Arc<Metrics>,
    inner: Arc<dyn EventSink>,
}

impl MetricsEventSink {
    pub fn new(metrics: Arc<Metrics>, inner: Arc<dyn EventSink>) -> Self {
        Self { metrics, inner }
    }
}

#[async_trait]
impl EventSink for MetricsEventSink {
    async fn reconciliation_required(&self, event: &PaymentReconciliationEvent) {
        self.metrics
            .reconciliations
            .with_label_values(&[event.operation.as_str()])
            .inc();
        self.inner.reconciliation_required(event).await;
    }

    async fn booking_transitioned(&self, event: &BookingTransitionedEvent) {
        self.metrics
            .transitions
            .with_label_values(&[event.to.as_str()])
            .inc();
        self.inner.booking_transitioned(event).await;
    }
}

pub async fn handle_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}
