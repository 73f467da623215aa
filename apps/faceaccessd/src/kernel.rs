//! The Supervisor: launches Transport and Pipeline as independently
//! restarted tasks, answers a ~15s liveness watchdog, and drives an orderly
//! shutdown on SIGINT/SIGTERM or a component giving up after too many
//! consecutive failures.

use crate::bootstrap::Components;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

const WATCHDOG_INTERVAL: Duration = Duration::from_secs(15);
const RESTART_BACKOFF_INITIAL: Duration = Duration::from_secs(5);
const RESTART_BACKOFF_MAX: Duration = Duration::from_secs(60);
const MAX_CONSECUTIVE_FAILURES: u32 = 10;
const SHUTDOWN_STEP_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(components: Components) -> anyhow::Result<()> {
    let Components {
        store,
        actuator,
        connection,
        ble_endpoints,
        mut pipeline_deps_factory,
        pipeline_config,
        ..
    } = components;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let signal_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("shutdown signal received");
        let _ = signal_shutdown.send(true);
    });

    tokio::spawn(watchdog_loop(shutdown_rx.clone()));

    let transport_shutdown_tx = shutdown_tx.clone();
    let transport_shutdown_rx = shutdown_rx.clone();
    let transport_handle = tokio::spawn(supervise("transport", transport_shutdown_tx, transport_shutdown_rx, move |shutdown| {
        let connection = connection.clone();
        let endpoints = ble_endpoints.clone();
        async move {
            faceaccess_transport::serve(endpoints, connection, shutdown)
                .await
                .map_err(anyhow::Error::from)
        }
    }));

    let pipeline_shutdown_tx = shutdown_tx.clone();
    let pipeline_shutdown_rx = shutdown_rx.clone();
    let pipeline_handle = tokio::spawn(supervise("pipeline", pipeline_shutdown_tx, pipeline_shutdown_rx, move |shutdown| {
        let deps = pipeline_deps_factory();
        let config = pipeline_config.clone();
        async move { faceaccess_pipeline::run(deps, config, shutdown).await.map_err(anyhow::Error::from) }
    }));

    shutdown_rx
        .clone()
        .wait_for(|shutting_down| *shutting_down)
        .await
        .ok();

    tracing::info!("stopping transport");
    if timeout(SHUTDOWN_STEP_TIMEOUT, transport_handle).await.is_err() {
        tracing::warn!("transport did not stop within the shutdown timeout");
    }

    tracing::info!("stopping pipeline");
    if timeout(SHUTDOWN_STEP_TIMEOUT, pipeline_handle).await.is_err() {
        tracing::warn!("pipeline did not stop within the shutdown timeout");
    }

    tracing::info!("stopping actuator");
    actuator.cleanup();

    tracing::info!("closing store");
    drop(store);

    tracing::info!("shutdown complete");
    Ok(())
}

/// Runs `task_fn` under an exponential-backoff restart policy: on `Err`,
/// waits (5s, 10s, 20s, ... capped at 60s) and retries; after
/// `MAX_CONSECUTIVE_FAILURES` in a row, gives up and triggers process-wide
/// shutdown. A clean return (normal shutdown) ends the loop without restart.
async fn supervise<F, Fut>(
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    mut shutdown_rx: watch::Receiver<bool>,
    mut task_fn: F,
) where
    F: FnMut(watch::Receiver<bool>) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut backoff = RESTART_BACKOFF_INITIAL;
    let mut consecutive_failures = 0u32;

    loop {
        if *shutdown_rx.borrow() {
            return;
        }

        match task_fn(shutdown_rx.clone()).await {
            Ok(()) => {
                tracing::info!(component = name, "stopped cleanly");
                return;
            }
            Err(err) => {
                consecutive_failures += 1;
                tracing::error!(component = name, error = %err, consecutive_failures, "component failed");

                if *shutdown_rx.borrow() {
                    return;
                }

                if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    tracing::error!(component = name, "giving up after too many consecutive failures; shutting down");
                    let _ = shutdown_tx.send(true);
                    return;
                }

                tracing::warn!(component = name, backoff_secs = backoff.as_secs(), "restarting after backoff");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(RESTART_BACKOFF_MAX);
            }
        }
    }
}

async fn watchdog_loop(mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(WATCHDOG_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                notify_watchdog();
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

/// Best-effort systemd `sd_notify` liveness ping (`WATCHDOG=1`). A no-op
/// when `NOTIFY_SOCKET` isn't set, which is the common case off-systemd.
fn notify_watchdog() {
    #[cfg(unix)]
    {
        use std::os::unix::net::UnixDatagram;

        let Ok(socket_path) = std::env::var("NOTIFY_SOCKET") else {
            return;
        };
        let Ok(socket) = UnixDatagram::unbound() else {
            return;
        };
        if let Err(err) = socket.send_to(b"WATCHDOG=1", &socket_path) {
            tracing::debug!(error = %err, "watchdog notify failed");
        }
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
