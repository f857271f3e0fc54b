use crate::config::WsConfig;
use crate::domain::notification::{ChatEvent, Delivery};
use crate::services::gateway::Metrics;
use crate::services::realtime_service::RealtimeService;
use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket, close_code};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

pub(crate) struct Session {
    pub(crate) user_id: i64,
    pub(crate) request_id: String,
    pub(crate) socket_id: String,
    pub(crate) socket: WebSocket,
    pub(crate) realtime: RealtimeService,
    pub(crate) metrics: Metrics,
    pub(crate) config: WsConfig,
    pub(crate) shutdown_rx: watch::Receiver<bool>,
}

/// First frame on every connection; clients send this id back in `X-Socket-ID`.
fn established_frame(socket_id: &str) -> String {
    json!({"event": "connection.established", "data": {"socket_id": socket_id}}).to_string()
}

fn event_frame(event: &ChatEvent) -> Option<String> {
    serde_json::to_string(event).ok()
}

/// What the session should do with one delivery from its channel.
fn frame_for(delivery: &Delivery, socket_id: &str) -> Option<String> {
    if delivery.is_echo_for(socket_id) {
        return None;
    }
    event_frame(&delivery.event)
}

impl Session {
    #[tracing::instrument(
        name = "websocket_session",
        skip(self),
        fields(
            user_id = self.user_id,
            request_id = %self.request_id,
            otel.kind = "server",
            ws.socket_id = %self.socket_id
        )
    )]
    pub(crate) async fn run(self) {
        let Self { user_id, socket_id, socket, realtime, metrics, config, mut shutdown_rx, .. } = self;

        metrics.active_connections.add(1, &[]);
        tracing::info!("WebSocket connected");

        // Subscribe before announcing the socket id so nothing published after the
        // client learns it can be missed
        let mut events = realtime.subscribe(user_id);
        let (mut ws_sink, mut ws_stream) = socket.split();

        if ws_sink.send(WsMessage::Text(established_frame(&socket_id).into())).await.is_err() {
            metrics.active_connections.add(-1, &[]);
            tracing::info!("WebSocket closed before handshake frame");
            return;
        }

        let mut heartbeat = tokio::time::interval(Duration::from_secs(config.heartbeat_interval_secs.max(1)));
        heartbeat.tick().await;

        loop {
            if *shutdown_rx.borrow() {
                tracing::info!("Shutdown signal received, closing WebSocket");
                let _ = ws_sink
                    .send(WsMessage::Close(Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: "Server shutting down".into(),
                    })))
                    .await;
                break;
            }

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {}

                msg = ws_stream.next() => {
                    match msg {
                        Some(Ok(WsMessage::Close(_)) | Err(_)) | None => break,
                        Some(Ok(WsMessage::Pong(_))) => tracing::trace!("Heartbeat acknowledged"),
                        Some(Ok(WsMessage::Ping(_))) => tracing::debug!("Received ping from client"),
                        Some(Ok(WsMessage::Text(_) | WsMessage::Binary(_))) => {
                            tracing::debug!("Ignoring client frame; the gateway is push-only");
                        }
                    }
                }

                result = events.recv() => {
                    match result {
                        Ok(delivery) => {
                            let Some(frame) = frame_for(&delivery, &socket_id) else {
                                metrics.echo_suppressed_total.add(1, &[]);
                                continue;
                            };
                            if ws_sink.send(WsMessage::Text(frame.into())).await.is_err() {
                                break;
                            }
                            metrics.forwarded_total.add(1, &[]);
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            // Clients recover by refetching the conversation list
                            tracing::warn!(missed, "WebSocket fell behind its realtime channel");
                            metrics.lagged_total.add(missed, &[]);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }

                _ = heartbeat.tick() => {
                    if ws_sink.send(WsMessage::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }

        let _ = ws_sink.close().await;

        metrics.active_connections.add(-1, &[]);
        tracing::info!("WebSocket disconnected");
    }
}
