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

use axum::Router;
use confide_server::api::{self, MgmtState};
use confide_server::config::Config;
use confide_server::{AppBuilder, Workers, adapters, telemetry};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::Instrument;

/// Everything bound and wired during boot, ready to be driven.
struct Booted {
    api: (TcpListener, Router),
    mgmt: (TcpListener, Router),
    workers: Workers,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

async fn boot(config: &Config) -> anyhow::Result<Booted> {
    let pool = adapters::database::init_pool(&config.database).await?;
    confide_server::run_migrations(&pool).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    confide_server::spawn_signal_handler(shutdown_tx.clone());

    let pubsub = adapters::redis::RedisClient::new(
        &config.pubsub,
        config.realtime.global_channel_capacity,
        shutdown_rx.clone(),
    )
    .await?;

    let app = AppBuilder::new(config.clone()).with_database(pool).with_pubsub(pubsub).build()?;

    let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;
    let api_listener = TcpListener::bind(api_addr).await?;
    let mgmt_listener = TcpListener::bind(mgmt_addr).await?;

    tracing::info!(address = %api_addr, "listening");
    tracing::info!(address = %mgmt_addr, "management server listening");

    Ok(Booted {
        api: (api_listener, api::app_router(config.clone(), app.services, shutdown_rx.clone())),
        mgmt: (mgmt_listener, api::mgmt_router(MgmtState { health_service: app.health_service })),
        workers: app.workers,
        shutdown_tx,
        shutdown_rx,
    })
}

async fn serve(listener: TcpListener, router: Router, mut shutdown_rx: watch::Receiver<bool>) -> std::io::Result<()> {
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|&stop| stop).await;
        })
        .await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    confide_server::setup_panic_hook();

    let Booted { api, mgmt, workers, shutdown_tx, shutdown_rx } =
        boot(&config).instrument(tracing::info_span!("boot_server")).await?;

    let worker_tasks = workers.spawn_all(shutdown_rx.clone());

    if let Err(e) = tokio::try_join!(
        serve(api.0, api.1, shutdown_rx.clone()),
        serve(mgmt.0, mgmt.1, shutdown_rx.clone())
    ) {
        tracing::error!(error = %e, "Server error");
    }

    // Either listener failing takes the whole node down
    let _ = shutdown_tx.send(true);
    let drain = futures::future::join_all(worker_tasks);
    if tokio::time::timeout(Duration::from_secs(config.server.shutdown_timeout_secs), drain).await.is_ok() {
        tracing::info!("Background tasks finished.");
    } else {
        tracing::warn!("Timeout waiting for background tasks to finish.");
    }

    telemetry_guard.shutdown();
    Ok(())
}
