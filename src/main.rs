//! Dartboard backend binary entrypoint wiring REST, WebSocket, the match engine and the serial link.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::{net::TcpListener, sync::watch};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dartboard_back::{
    config::AppConfig,
    dao::snapshot_store::{JsonFileStore, SnapshotStore},
    routes,
    services::{
        dartboard::{DartboardSupervisor, LinkState, ReconnectPolicy, SerialConnector},
        engine::{Engine, EngineOptions},
        storage_supervisor,
    },
    state::{AppState, SharedState, broadcast::BroadcastHub, registry::Registry},
};

const BROADCAST_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let cancel = CancellationToken::new();

    let store: Arc<dyn SnapshotStore> = Arc::new(JsonFileStore::new(&config.database_path));
    let snapshot = storage_supervisor::load_clean_slate(store.as_ref())
        .await
        .with_context(|| format!("loading {}", config.database_path.display()))?;

    let hub = Arc::new(BroadcastHub::new(BROADCAST_CAPACITY));
    let (link_tx, link_rx) = watch::channel(LinkState::Disconnected);
    let (snapshot_tx, snapshot_rx) = watch::channel(snapshot.clone());

    let (engine, _engine_task) = Engine::spawn(
        Registry::from_snapshot(snapshot),
        hub.clone(),
        link_rx.clone(),
        snapshot_tx,
        EngineOptions {
            allow_start_without_board: config.allow_start_without_board,
            ..EngineOptions::default()
        },
    );

    let writer_task = tokio::spawn(storage_supervisor::run(
        store,
        snapshot_rx,
        cancel.child_token(),
    ));

    let supervisor = DartboardSupervisor::new(
        Arc::new(SerialConnector::new(&config.serial_port, config.baud_rate)),
        engine.clone(),
        hub.clone(),
        link_tx,
        ReconnectPolicy::from(&config),
    );
    let dartboard_task = tokio::spawn(supervisor.run(cancel.child_token()));

    let port = config.port;
    let app_state = AppState::new(engine, hub, link_rx, config);
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    // Stop the serial link first so no hit lands after the final snapshot flush.
    cancel.cancel();
    dartboard_task.await.context("joining dartboard supervisor")?;
    writer_task.await.context("joining storage writer")?;
    info!("shutdown complete");

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "cannot install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
