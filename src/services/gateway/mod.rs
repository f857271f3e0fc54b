mod session;

use crate::config::WsConfig;
use crate::services::realtime_service::RealtimeService;
use axum::extract::ws::WebSocket;
use opentelemetry::{
    global,
    metrics::{Counter, UpDownCounter},
};
use session::Session;
use tokio::sync::watch;

#[derive(Clone, Debug)]
pub(crate) struct Metrics {
    pub(crate) active_connections: UpDownCounter<i64>,
    pub(crate) forwarded_total: Counter<u64>,
    pub(crate) echo_suppressed_total: Counter<u64>,
    pub(crate) lagged_total: Counter<u64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("confide-server");
        Self {
            active_connections: meter
                .i64_up_down_counter("confide_websocket_active_connections")
                .with_description("Number of active WebSocket connections")
                .build(),
            forwarded_total: meter
                .u64_counter("confide_websocket_events_forwarded_total")
                .with_description("Realtime events written to sockets")
                .build(),
            echo_suppressed_total: meter
                .u64_counter("confide_websocket_echo_suppressed_total")
                .with_description("Events skipped because the socket caused them")
                .build(),
            lagged_total: meter
                .u64_counter("confide_websocket_lagged_events_total")
                .with_description("Events lost because a socket fell behind its channel")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GatewayService {
    realtime: RealtimeService,
    config: WsConfig,
    metrics: Metrics,
}

impl GatewayService {
    #[must_use]
    pub fn new(realtime: RealtimeService, config: WsConfig) -> Self {
        Self { realtime, config, metrics: Metrics::new() }
    }

    pub async fn handle_socket(
        &self,
        socket: WebSocket,
        user_id: i64,
        request_id: String,
        shutdown_rx: watch::Receiver<bool>,
    ) {
        let session = Session {
            user_id,
            request_id,
            socket_id: uuid::Uuid::new_v4().to_string(),
            socket,
            realtime: self.realtime.clone(),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
            shutdown_rx,
        };

        session.run().await;
    }
}
