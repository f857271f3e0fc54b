use crate::domain::message::Message;
use crate::domain::notification::{ChatEvent, Delivery};
use async_trait::async_trait;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::Instrument;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport failure: {0}")]
    Other(#[from] anyhow::Error),
}

/// Outbound side of the realtime transport: one logical channel per user.
#[async_trait]
pub trait RealtimeTransport: Send + Sync + std::fmt::Debug {
    /// Publishes `delivery` on `user_id`'s channel.
    ///
    /// # Errors
    /// Returns `TransportError` if the event could not be handed to the transport.
    async fn publish(&self, user_id: i64, delivery: &Delivery) -> Result<(), TransportError>;
}

#[derive(Clone, Debug)]
struct Metrics {
    publish_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("confide-server");
        Self {
            publish_total: meter
                .u64_counter("confide_realtime_publish_total")
                .with_description("Realtime publish attempts by event and outcome")
                .build(),
        }
    }
}

/// Pushes chat events to the transport after the ledger has committed.
///
/// Each batch is published on its own task so callers never wait on the
/// transport. Failures and timeouts are logged and counted, never returned.
#[derive(Clone, Debug)]
pub struct DeliveryService {
    transport: Arc<dyn RealtimeTransport>,
    publish_timeout: Duration,
    metrics: Metrics,
}

impl DeliveryService {
    #[must_use]
    pub fn new(transport: Arc<dyn RealtimeTransport>, publish_timeout_ms: u64) -> Self {
        Self { transport, publish_timeout: Duration::from_millis(publish_timeout_ms), metrics: Metrics::new() }
    }

    /// Announces a new message to its receiver and to the sender's other sessions.
    pub fn message_created(&self, message: &Message, origin_socket: Option<&str>) -> JoinHandle<()> {
        let delivery = Delivery {
            origin_socket: origin_socket.map(str::to_string),
            event: ChatEvent::MessageCreated { message: message.clone() },
        };

        let span = tracing::debug_span!("announce_message", message_id = message.id);
        self.spawn_batch(vec![(message.receiver_id, delivery.clone()), (message.sender_id, delivery)], span)
    }

    /// Emits one read receipt per transitioned message, in the given order.
    pub fn read_receipts(&self, messages: &[Message], origin_socket: Option<&str>) -> JoinHandle<()> {
        let batch = messages
            .iter()
            .map(|m| {
                let delivery = Delivery {
                    origin_socket: origin_socket.map(str::to_string),
                    event: ChatEvent::read_receipt(m.id, m.sender_id),
                };
                (m.sender_id, delivery)
            })
            .collect();

        let span = tracing::debug_span!("announce_receipts", count = messages.len());
        self.spawn_batch(batch, span)
    }

    /// One task per batch keeps in-batch order.
    fn spawn_batch(&self, batch: Vec<(i64, Delivery)>, span: tracing::Span) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move { service.publish_batch(&batch).await }.instrument(span))
    }

    async fn publish_batch(&self, batch: &[(i64, Delivery)]) {
        let publish_all = async {
            for (user_id, delivery) in batch {
                let event = delivery.event.name();
                match self.transport.publish(*user_id, delivery).await {
                    Ok(()) => {
                        self.metrics
                            .publish_total
                            .add(1, &[KeyValue::new("event", event), KeyValue::new("status", "ok")]);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, user_id, event, "Failed to publish realtime event");
                        self.metrics
                            .publish_total
                            .add(1, &[KeyValue::new("event", event), KeyValue::new("status", "error")]);
                    }
                }
            }
        };

        if tokio::time::timeout(self.publish_timeout, publish_all).await.is_err() {
            tracing::warn!(timeout_ms = self.publish_timeout.as_millis(), "Realtime publish timed out, batch abandoned");
            self.metrics.publish_total.add(1, &[KeyValue::new("event", "batch"), KeyValue::new("status", "timeout")]);
        }
    }
}
