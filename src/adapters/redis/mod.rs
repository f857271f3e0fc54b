use crate::config::PubSubConfig;
use backon::{ExponentialBuilder, Retryable};
use dashmap::DashMap;
use futures::StreamExt;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, watch};
use tracing::Instrument;

pub mod realtime_repo;

pub use realtime_repo::RealtimeRepository;

/// A raw message received through a pattern subscription.
#[derive(Debug, Clone)]
pub struct PubSubMessage {
    pub channel: String,
    pub payload: Vec<u8>,
}

type PatternSenders = Arc<DashMap<String, broadcast::Sender<PubSubMessage>>>;

#[derive(Debug)]
pub struct RedisClient {
    publisher: redis::aio::ConnectionManager,
    // One listener task per pattern, shared by every local subscriber
    patterns: PatternSenders,
    client: redis::Client,
    shutdown: watch::Receiver<bool>,
    channel_capacity: usize,
    config: PubSubConfig,
}

impl RedisClient {
    /// Connects the publishing side; pattern listeners are started lazily.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the initial connection fails.
    pub async fn new(
        config: &PubSubConfig,
        channel_capacity: usize,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<Arc<Self>> {
        let client = redis::Client::open(config.url.as_str())?;
        let publisher = client.get_connection_manager().await?;

        Ok(Arc::new(Self {
            publisher,
            patterns: Arc::new(DashMap::new()),
            client,
            shutdown,
            channel_capacity,
            config: config.clone(),
        }))
    }

    #[must_use]
    pub fn publisher(&self) -> redis::aio::ConnectionManager {
        self.publisher.clone()
    }

    /// Publishes `payload` on `channel` and returns the number of Redis subscribers that got it.
    ///
    /// # Errors
    /// Returns an error if the `PUBLISH` command fails.
    pub async fn publish(&self, channel: &str, payload: &[u8]) -> anyhow::Result<i64> {
        let mut conn = self.publisher();
        let receivers = conn.publish::<_, _, i64>(channel, payload).await?;
        Ok(receivers)
    }

    /// Subscribes to a Redis pattern, starting a background listener on first use.
    ///
    /// # Errors
    /// Returns an error if the subscription cannot be set up.
    pub async fn subscribe(&self, pattern: &str) -> anyhow::Result<broadcast::Receiver<PubSubMessage>> {
        if let Some(tx) = self.patterns.get(pattern) {
            return Ok(tx.subscribe());
        }

        let (tx, rx) = broadcast::channel(self.channel_capacity);
        self.patterns.insert(pattern.to_string(), tx.clone());

        let (ready_tx, ready_rx) = oneshot::channel();
        let listener = PatternListener {
            client: self.client.clone(),
            pattern: pattern.to_string(),
            tx,
            shutdown: self.shutdown.clone(),
            patterns: Arc::clone(&self.patterns),
            config: self.config.clone(),
        };

        tokio::spawn(listener.run(ready_tx).instrument(tracing::debug_span!("pubsub_listener", pattern = %pattern)));

        // Returns once PSUBSCRIBE has been acknowledged, or the listener gave up
        let _ = ready_rx.await;

        Ok(rx)
    }

    /// Pings the Redis server.
    ///
    /// # Errors
    /// Returns an error if the ping fails.
    pub async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.publisher();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

struct PatternListener {
    client: redis::Client,
    pattern: String,
    tx: broadcast::Sender<PubSubMessage>,
    shutdown: watch::Receiver<bool>,
    patterns: PatternSenders,
    config: PubSubConfig,
}

impl PatternListener {
    async fn run(mut self, ready_tx: oneshot::Sender<()>) {
        let retry_strategy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_secs(self.config.min_backoff_secs))
            .with_max_delay(Duration::from_secs(self.config.max_backoff_secs));

        let mut ready_tx = Some(ready_tx);

        loop {
            let client = self.client.clone();
            let pattern = self.pattern.clone();
            let pubsub_result = (|| {
                let client = client.clone();
                let pattern = pattern.clone();
                async move {
                    let mut pubsub = client.get_async_pubsub().await?;
                    pubsub.psubscribe(&pattern).await?;
                    Ok::<redis::aio::PubSub, redis::RedisError>(pubsub)
                }
            })
            .retry(retry_strategy)
            .when(|e| {
                tracing::warn!(error = %e, "Failed to subscribe to pubsub, retrying...");
                true
            })
            .notify(|e, duration| {
                tracing::debug!(?duration, error = ?e, "Pubsub subscription retry scheduled");
            })
            .await;

            let pubsub = match pubsub_result {
                Ok(pubsub) => pubsub,
                Err(e) => {
                    tracing::error!(error = %e, "Pubsub subscription failed after retries");
                    break;
                }
            };

            tracing::info!(pattern = %self.pattern, "Subscribed to pubsub pattern");
            if let Some(ready) = ready_tx.take() {
                let _ = ready.send(());
            }

            let mut stream = pubsub.into_on_message();

            loop {
                tokio::select! {
                    _ = self.shutdown.changed() => {
                        self.patterns.remove(&self.pattern);
                        return;
                    }
                    msg = stream.next() => {
                        let Some(msg) = msg else {
                            tracing::warn!(pattern = %self.pattern, "Pubsub connection lost, reconnecting...");
                            break;
                        };

                        let message = PubSubMessage {
                            channel: msg.get_channel_name().to_string(),
                            payload: msg.get_payload().unwrap_or_default(),
                        };
                        // No local receivers is not an error; the listener lives until shutdown
                        let _ = self.tx.send(message);
                    }
                }
            }

            if *self.shutdown.borrow() {
                break;
            }
        }

        self.patterns.remove(&self.pattern);
    }
}
