use crate::adapters::redis::RealtimeRepository;
use crate::services::realtime_service::RealtimeService;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::Instrument;

/// Moves realtime events from the pub/sub pattern subscription to local channels
/// and periodically reclaims channels nobody listens to.
#[derive(Debug)]
pub struct RealtimeWorker {
    service: RealtimeService,
    repo: RealtimeRepository,
    gc_interval_secs: u64,
}

impl RealtimeWorker {
    #[must_use]
    pub const fn new(service: RealtimeService, repo: RealtimeRepository, gc_interval_secs: u64) -> Self {
        Self { service, repo, gc_interval_secs }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut gc_interval = tokio::time::interval(Duration::from_secs(self.gc_interval_secs.max(1)));

        let mut pubsub_rx = match self.repo.subscribe_realtime().await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::error!(error = %e, "Failed to subscribe to realtime channels, worker exiting");
                return;
            }
        };

        tracing::info!("Realtime worker started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,

                _ = gc_interval.tick() => {
                    async {
                        self.service.perform_gc();
                    }
                    .instrument(tracing::debug_span!("realtime_gc_iteration"))
                    .await;
                }

                result = pubsub_rx.recv() => {
                    match result {
                        Ok(message) => {
                            if let Some(notification) = self.repo.decode(&message) {
                                self.service.dispatch(notification);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(missed = n, "Realtime dispatcher lagged behind pub/sub");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::error!("Realtime stream closed, worker exiting");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Realtime worker shutting down...");
    }
}
