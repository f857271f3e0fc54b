use crate::config::RealtimeConfig;
use crate::domain::notification::{Delivery, RealtimeNotification};
use dashmap::DashMap;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, UpDownCounter},
};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone, Debug)]
struct Metrics {
    received_total: Counter<u64>,
    unrouted_total: Counter<u64>,
    active_channels: UpDownCounter<i64>,
    gc_duration_seconds: Histogram<f64>,
    gc_reclaimed_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("confide-server");
        Self {
            received_total: meter
                .u64_counter("confide_realtime_received_total")
                .with_description("Realtime events received from pub/sub")
                .build(),
            unrouted_total: meter
                .u64_counter("confide_realtime_unrouted_total")
                .with_description("Realtime events with no local listener")
                .build(),
            active_channels: meter
                .i64_up_down_counter("confide_realtime_channels")
                .with_description("Number of local per-user channels")
                .build(),
            gc_duration_seconds: meter
                .f64_histogram("confide_realtime_gc_duration_seconds")
                .with_description("Time taken by one channel GC pass")
                .build(),
            gc_reclaimed_total: meter
                .u64_counter("confide_realtime_channels_reclaimed_total")
                .with_description("Stale local channels reclaimed by GC")
                .build(),
        }
    }
}

/// Local fan-out of realtime events to the sockets connected to this node.
#[derive(Clone, Debug)]
pub struct RealtimeService {
    channels: Arc<DashMap<i64, broadcast::Sender<Delivery>>>,
    user_channel_capacity: usize,
    metrics: Metrics,
}

impl RealtimeService {
    #[must_use]
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            user_channel_capacity: config.user_channel_capacity,
            metrics: Metrics::new(),
        }
    }

    /// Receiver for every delivery addressed to `user_id` on this node.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn subscribe(&self, user_id: i64) -> broadcast::Receiver<Delivery> {
        self.channels
            .entry(user_id)
            .or_insert_with(|| {
                self.metrics.active_channels.add(1, &[]);
                let (tx, _rx) = broadcast::channel(self.user_channel_capacity);
                tx
            })
            .subscribe()
    }

    /// Hands a notification that crossed the transport to local listeners.
    pub fn dispatch(&self, notification: RealtimeNotification) {
        let user_id = notification.user_id;
        let event = notification.delivery.event.name();

        self.metrics.received_total.add(1, &[KeyValue::new("event", event)]);

        if let Some(tx) = self.channels.get(&user_id) {
            tracing::trace!(user_id, event, "Dispatched realtime event to local channel");
            let _ = tx.send(notification.delivery);
        } else {
            tracing::trace!(user_id, event, "No local listener for realtime event");
            self.metrics.unrouted_total.add(1, &[KeyValue::new("event", event)]);
        }
    }

    /// Drops channels whose last receiver went away.
    pub fn perform_gc(&self) {
        let start = std::time::Instant::now();
        let mut reclaimed = 0;

        self.channels.retain(|_, sender| {
            let active = sender.receiver_count() > 0;
            if !active {
                self.metrics.active_channels.add(-1, &[]);
                reclaimed += 1;
            }
            active
        });

        let duration = start.elapsed().as_secs_f64();
        self.metrics.gc_duration_seconds.record(duration, &[]);

        if reclaimed > 0 {
            self.metrics.gc_reclaimed_total.add(reclaimed, &[]);
            tracing::info!(reclaimed, "Realtime channel GC reclaimed stale channels");
        }
        tracing::debug!(duration_secs = %duration, "Realtime channel GC cycle completed");
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
