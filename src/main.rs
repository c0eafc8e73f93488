//! rinkside binary entrypoint wiring the tracking engine, storage supervisor, REST and SSE layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rinkside::{
    config::AppConfig,
    dao::local_cache::{LIVE_GAME_NAMESPACE, LocalCache},
    engine::{LiveGameEngine, SystemWallClock},
    routes,
    services::{
        sse_service,
        storage_supervisor::{self, StorageBackend},
    },
    state::{AppState, DEFAULT_SSE_CAPACITY, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let cache = config
        .cache_dir()
        .map(|dir| LocalCache::new(dir, LIVE_GAME_NAMESPACE));
    let engine = LiveGameEngine::with_parts(config.tracking(), Arc::new(SystemWallClock), cache);
    match engine.restore_from_cache() {
        Ok(true) => info!("resumed live game from local cache"),
        Ok(false) => {}
        Err(err) => warn!(error = %err, "failed to read the live game cache; starting empty"),
    }

    let app_state = AppState::new(engine, DEFAULT_SSE_CAPACITY);
    sse_service::spawn_forwarders(app_state.clone());

    let backend = StorageBackend::from_env();
    info!(?backend, "starting storage supervisor");
    tokio::spawn(storage_supervisor::run(
        app_state.clone(),
        storage_supervisor::connector(backend),
    ));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

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
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
