use crate::adapters::database::MessageStore;
use crate::domain::message::Message;
use crate::error::{AppError, Result};
use crate::services::delivery::DeliveryService;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;

pub const SELF_CHAT_ERROR: &str = "Cannot chat with yourself";

#[derive(Clone, Debug)]
struct Metrics {
    transitions_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("confide-server");
        Self {
            transitions_total: meter
                .u64_counter("confide_read_transitions_total")
                .with_description("Messages moved from sent to read")
                .build(),
        }
    }
}

/// Owns the only status transition a message can make: `sent → read`.
#[derive(Clone, Debug)]
pub struct ReadStateService {
    messages: Arc<dyn MessageStore>,
    delivery: DeliveryService,
    metrics: Metrics,
}

impl ReadStateService {
    #[must_use]
    pub fn new(messages: Arc<dyn MessageStore>, delivery: DeliveryService) -> Self {
        Self { messages, delivery, metrics: Metrics::new() }
    }

    /// Marks everything `partner` sent to `me` as read and returns how many messages changed.
    ///
    /// # Errors
    /// Returns `AppError::SelfAction` if `me == partner`.
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(err(level = "warn"), skip(self, origin_socket))]
    pub async fn mark_read(&self, me: i64, partner: i64, origin_socket: Option<&str>) -> Result<usize> {
        if me == partner {
            return Err(AppError::SelfAction(SELF_CHAT_ERROR.to_string()));
        }

        let changed = self.transition(me, partner, origin_socket, "explicit").await?;
        Ok(changed.len())
    }

    /// Runs the conditional update and announces a receipt for each changed row.
    pub(crate) async fn transition(
        &self,
        me: i64,
        partner: i64,
        origin_socket: Option<&str>,
        trigger: &'static str,
    ) -> Result<Vec<Message>> {
        let changed = self.messages.mark_read_from(partner, me).await?;

        if !changed.is_empty() {
            tracing::debug!(count = changed.len(), trigger, "Messages marked as read");
            self.metrics.transitions_total.add(changed.len() as u64, &[KeyValue::new("trigger", trigger)]);
            self.delivery.read_receipts(&changed, origin_socket);
        }

        Ok(changed)
    }
}
