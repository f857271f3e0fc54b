#![allow(dead_code)]

use confide_server::adapters::database::{self, DbPool};
use confide_server::adapters::redis::RedisClient;
use confide_server::api::{self, MgmtState};
use confide_server::config::Config;
use confide_server::domain::auth::Claims;
use confide_server::{AppBuilder, run_migrations};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret";

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("confide_server=debug".parse().unwrap())
            .add_directive("sqlx=warn".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap())
            .add_directive("tungstenite=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

pub fn get_test_config() -> Config {
    let mut config = Config::default();
    if let Ok(url) = std::env::var("CONFIDE_DATABASE_URL") {
        config.database.url = url;
    }
    if let Ok(url) = std::env::var("CONFIDE_PUBSUB_URL") {
        config.pubsub.url = url;
    }
    config.database.min_connections = 0;
    config.auth.jwt_secret = JWT_SECRET.to_string();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.mgmt_port = 0;
    config.rate_limit.per_second = 10_000;
    config.rate_limit.burst = 10_000;
    config
}

pub fn generate_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..8])
}

pub struct TestUser {
    pub user_id: i64,
    pub name: String,
    pub token: String,
}

pub struct TestApp {
    pub server_url: String,
    pub mgmt_url: String,
    pub ws_url: String,
    pub client: reqwest::Client,
    pub pool: DbPool,
    pub config: Config,
    pub shutdown_tx: watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        setup_tracing();

        let pool = database::init_pool(&config.database).await.expect("Failed to connect to DB. Is Postgres running?");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pubsub = RedisClient::new(&config.pubsub, config.realtime.global_channel_capacity, shutdown_rx.clone())
            .await
            .expect("Failed to connect to Redis. Is it running?");

        // Establish the pattern subscription before any test traffic is published
        let _ = pubsub.subscribe(&format!("{}*", config.realtime.channel_prefix)).await.expect("psubscribe");

        let app = AppBuilder::new(config.clone())
            .with_database(pool.clone())
            .with_pubsub(Arc::clone(&pubsub))
            .build()
            .expect("Failed to wire application");

        let app_router = api::app_router(config.clone(), app.services, shutdown_rx.clone());
        let mgmt_router = api::mgmt_router(MgmtState { health_service: app.health_service });

        let api_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_addr = api_listener.local_addr().unwrap();
        let mgmt_addr = mgmt_listener.local_addr().unwrap();

        let _ = app.workers.spawn_all(shutdown_rx.clone());

        let mut api_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(api_listener, app_router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = api_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        let mut mgmt_rx = shutdown_rx;
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = mgmt_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        // Let the realtime worker attach to the pattern subscription
        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            server_url: format!("http://{api_addr}/v1"),
            mgmt_url: format!("http://{mgmt_addr}"),
            ws_url: format!("ws://{api_addr}/v1/gateway"),
            client: reqwest::Client::new(),
            pool,
            config,
            shutdown_tx,
        }
    }

    /// Users are owned by the host application, so tests insert them directly.
    pub async fn register_user(&self, name: &str) -> TestUser {
        let user_id: i64 = sqlx::query_scalar("INSERT INTO users (name, email) VALUES ($1, $2) RETURNING id")
            .bind(name)
            .bind(format!("{}@example.test", Uuid::new_v4()))
            .fetch_one(&self.pool)
            .await
            .expect("Failed to insert user");

        let token = Claims::new(user_id, 3600).encode(JWT_SECRET).unwrap();
        TestUser { user_id, name: name.to_string(), token }
    }

    pub async fn create_post(&self, owner_id: i64, content: &str) -> i64 {
        sqlx::query_scalar("INSERT INTO posts (user_id, content) VALUES ($1, $2) RETURNING id")
            .bind(owner_id)
            .bind(content)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to insert post")
    }

    pub async fn send_message(&self, token: &str, receiver_id: i64, body: &str) -> Value {
        let resp = self
            .client
            .post(format!("{}/messages", self.server_url))
            .bearer_auth(token)
            .json(&serde_json::json!({ "receiver_id": receiver_id, "body": body }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
        resp.json().await.unwrap()
    }

    pub async fn get_json(&self, token: &str, path: &str) -> (reqwest::StatusCode, Value) {
        let resp = self.client.get(format!("{}{}", self.server_url, path)).bearer_auth(token).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    pub async fn connect_ws(&self, token: &str) -> TestWsClient {
        let url = format!("{}?token={}", self.ws_url, token);
        let (stream, _) = tokio_tungstenite::connect_async(url).await.expect("Failed to connect");
        let mut client = TestWsClient { stream, socket_id: String::new() };

        let established = client.receive_event_timeout(Duration::from_secs(5)).await.expect("No handshake frame");
        assert_eq!(established["event"], "connection.established");
        client.socket_id = established["data"]["socket_id"].as_str().unwrap().to_string();
        client
    }
}

pub struct TestWsClient {
    pub stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pub socket_id: String,
}

impl TestWsClient {
    pub async fn receive_raw_timeout(
        &mut self,
        timeout: Duration,
    ) -> Option<Result<Message, tokio_tungstenite::tungstenite::Error>> {
        tokio::time::timeout(timeout, self.stream.next()).await.ok().flatten()
    }

    /// Next JSON event, skipping control frames.
    pub async fn receive_event_timeout(&mut self, timeout: Duration) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, self.stream.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => return serde_json::from_str(&text).ok(),
                Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {}
                _ => return None,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.stream.send(Message::Close(None)).await;
    }
}
