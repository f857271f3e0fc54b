use crate::adapters::redis::{PubSubMessage, RedisClient};
use crate::domain::notification::{Delivery, RealtimeNotification};
use crate::services::delivery::{RealtimeTransport, TransportError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Per-user chat channels on Redis pub/sub, named `{prefix}{user_id}`.
#[derive(Debug, Clone)]
pub struct RealtimeRepository {
    redis: Arc<RedisClient>,
    channel_prefix: String,
}

impl RealtimeRepository {
    #[must_use]
    pub const fn new(redis: Arc<RedisClient>, channel_prefix: String) -> Self {
        Self { redis, channel_prefix }
    }

    #[must_use]
    pub fn channel_for(&self, user_id: i64) -> String {
        format!("{}{user_id}", self.channel_prefix)
    }

    /// Subscribes to every user channel at once.
    ///
    /// # Errors
    /// Returns an error if the subscription fails.
    pub async fn subscribe_realtime(&self) -> anyhow::Result<broadcast::Receiver<PubSubMessage>> {
        let pattern = format!("{}*", self.channel_prefix);
        self.redis.subscribe(&pattern).await
    }

    /// Turns a raw pub/sub message back into a routed notification.
    #[must_use]
    pub fn decode(&self, message: &PubSubMessage) -> Option<RealtimeNotification> {
        decode_message(&self.channel_prefix, message)
    }
}

pub(crate) fn decode_message(channel_prefix: &str, message: &PubSubMessage) -> Option<RealtimeNotification> {
    let user_id = message.channel.strip_prefix(channel_prefix)?.parse::<i64>().ok()?;

    match serde_json::from_slice::<Delivery>(&message.payload) {
        Ok(delivery) => Some(RealtimeNotification { user_id, delivery }),
        Err(e) => {
            tracing::warn!(error = %e, channel = %message.channel, "Dropping undecodable realtime payload");
            None
        }
    }
}

#[async_trait]
impl RealtimeTransport for RealtimeRepository {
    async fn publish(&self, user_id: i64, delivery: &Delivery) -> Result<(), TransportError> {
        let channel = self.channel_for(user_id);
        let payload = serde_json::to_vec(delivery).map_err(|e| TransportError::Other(e.into()))?;

        let receivers = self.redis.publish(&channel, &payload).await?;
        tracing::trace!(%channel, event = delivery.event.name(), receivers, "Published realtime event");
        Ok(())
    }
}
