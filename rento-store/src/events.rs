use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rento_core::events::{EventSink, LogEventSink};
use rento_shared::{BookingTransitionedEvent, PaymentReconciliationEvent};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

/// Publishes domain events to a Kafka topic, keyed by booking id. Every event
/// also goes to the log so a broker outage never hides a reconciliation.
#[derive(Clone)]
pub struct KafkaEventSink {
    producer: FutureProducer,
    topic: String,
}

impl KafkaEventSink {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }

    async fn publish<T: Serialize>(&self, event_type: &str, key: &str, event: &T) {
        let payload = match serde_json::to_string(&serde_json::json!({
            "type": event_type,
            "data": event,
        })) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode {} event: {}", event_type, e);
                return;
            }
        };

        let record = FutureRecord::to(&self.topic).key(key).payload(&payload);
        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent {} to {}: partition {} offset {}",
                    event_type, self.topic, delivery.partition, delivery.offset
                );
            }
            Err((e, _msg)) => {
                error!("Failed to send {} to {}: {}", event_type, self.topic, e);
            }
        }
    }
}

#[async_trait]
impl EventSink for KafkaEventSink {
    async fn reconciliation_required(&self, event: &PaymentReconciliationEvent) {
        LogEventSink.reconciliation_required(event).await;
        self.publish("payment.reconciliation_required", &event.booking_id.to_string(), event)
            .await;
    }

    async fn booking_transitioned(&self, event: &BookingTransitionedEvent) {
        self.publish("booking.transitioned", &event.booking_id.to_string(), event)
            .await;
    }
}
