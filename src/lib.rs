#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

#[cfg(test)]
mod test_support;

use crate::adapters::database::{
    DbPool, MessageRepository, MessageStore, PostRepository, PostStore, UserDirectory, UserRepository,
};
use crate::adapters::redis::{RealtimeRepository, RedisClient};
use crate::api::ServiceContainer;
use crate::config::Config;
use crate::services::conversation_service::ConversationService;
use crate::services::delivery::DeliveryService;
use crate::services::gateway::GatewayService;
use crate::services::health_service::HealthService;
use crate::services::message_service::MessageService;
use crate::services::rate_limit_service::RateLimitService;
use crate::services::read_state::ReadStateService;
use crate::services::realtime_service::RealtimeService;
use crate::services::share_service::ShareService;
use crate::workers::RealtimeWorker;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Everything `main` needs after wiring: request-facing services, probes and workers.
#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
    pub workers: Workers,
}

/// Background tasks, spawned explicitly once the listeners are bound.
#[derive(Debug)]
pub struct Workers {
    realtime: RealtimeWorker,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![tokio::spawn(self.realtime.run(shutdown_rx).instrument(tracing::info_span!("realtime_worker")))]
    }
}

#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    pool: Option<DbPool>,
    pubsub: Option<Arc<RedisClient>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, pool: None, pubsub: None }
    }

    #[must_use]
    pub fn with_database(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn with_pubsub(mut self, pubsub: Arc<RedisClient>) -> Self {
        self.pubsub = Some(pubsub);
        self
    }

    /// Wires repositories, services and workers together. Performs no I/O.
    ///
    /// # Errors
    /// Returns an error if the database pool or pub/sub client was not provided.
    pub fn build(self) -> anyhow::Result<App> {
        let config = self.config;
        let pool = self.pool.ok_or_else(|| anyhow::anyhow!("Database pool is required"))?;
        let pubsub = self.pubsub.ok_or_else(|| anyhow::anyhow!("PubSub client is required"))?;

        let messages: Arc<dyn MessageStore> = Arc::new(MessageRepository::new(pool.clone()));
        let users: Arc<dyn UserDirectory> = Arc::new(UserRepository::new(pool.clone()));
        let posts: Arc<dyn PostStore> = Arc::new(PostRepository::new(pool.clone()));
        let realtime_repo = RealtimeRepository::new(Arc::clone(&pubsub), config.realtime.channel_prefix.clone());

        let delivery = DeliveryService::new(Arc::new(realtime_repo.clone()), config.realtime.publish_timeout_ms);
        let read_state_service = ReadStateService::new(Arc::clone(&messages), delivery.clone());
        let message_service = MessageService::new(
            Arc::clone(&messages),
            Arc::clone(&users),
            Arc::clone(&posts),
            delivery,
            read_state_service.clone(),
            &config.messaging,
        );
        let share_service = ShareService::new(message_service.clone(), Arc::clone(&users), posts, &config.messaging);
        let conversation_service = ConversationService::new(messages, users);

        let realtime_service = RealtimeService::new(&config.realtime);
        let gateway_service = GatewayService::new(realtime_service.clone(), config.websocket.clone());

        let health_service = HealthService::new(pool, pubsub, config.health.clone());
        let rate_limit_service = RateLimitService::new(config.server.trusted_proxies.clone());

        let workers = Workers {
            realtime: RealtimeWorker::new(realtime_service, realtime_repo, config.realtime.gc_interval_secs),
        };

        Ok(App {
            services: ServiceContainer {
                message_service,
                read_state_service,
                conversation_service,
                share_service,
                gateway_service,
                rate_limit_service,
            },
            health_service,
            workers,
        })
    }
}

/// Applies pending migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    sqlx::migrate!().run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Flips the shutdown channel on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown signal received, draining connections");
        let _ = shutdown_tx.send(true);
    });
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Routes panics through tracing so they reach the structured log.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map(|l| format!("{}:{}", l.file(), l.line())).unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());

        tracing::error!(%location, panic = %payload, "Thread panicked");
    }));
}
