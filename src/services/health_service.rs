use crate::adapters::database::DbPool;
use crate::adapters::redis::RedisClient;
use crate::config::HealthConfig;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
struct Metrics {
    status: Gauge<i64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("confide-server");
        Self {
            status: meter
                .i64_gauge("confide_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HealthService {
    pool: DbPool,
    pubsub: Arc<RedisClient>,
    config: HealthConfig,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(pool: DbPool, pubsub: Arc<RedisClient>, config: HealthConfig) -> Self {
        Self { pool, pubsub, config, metrics: Metrics::new() }
    }

    /// Checks database connectivity.
    ///
    /// # Errors
    /// Returns a description of the failure if the database is unreachable.
    pub async fn check_db(&self) -> Result<(), String> {
        let db_timeout = Duration::from_millis(self.config.db_timeout_ms);
        let outcome = match timeout(db_timeout, sqlx::query("SELECT 1").execute(&self.pool)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(format!("Database connection failed: {e}")),
            Err(_) => Err("Database connection timed out".to_string()),
        };
        self.record("database", outcome.is_ok());
        outcome
    }

    /// Checks pub/sub connectivity.
    ///
    /// # Errors
    /// Returns a description of the failure if Redis is unreachable.
    pub async fn check_pubsub(&self) -> Result<(), String> {
        let pubsub_timeout = Duration::from_millis(self.config.pubsub_timeout_ms);
        let outcome = match timeout(pubsub_timeout, self.pubsub.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("PubSub connection failed: {e}")),
            Err(_) => Err("PubSub connection timed out".to_string()),
        };
        self.record("pubsub", outcome.is_ok());
        outcome
    }

    fn record(&self, component: &'static str, healthy: bool) {
        self.metrics.status.record(i64::from(healthy), &[KeyValue::new("component", component)]);
    }
}
