use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use civic_db::{MemoryNotificationStore, NotificationStore, PgNotificationStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use civic_api::background::expiry_sweep;
use civic_api::config::ServerConfig;
use civic_api::notifications::EventRouter;
use civic_api::router::build_app_router;
use civic_api::state::AppState;
use civic_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "civic_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Notification store ---
    let store: Arc<dyn NotificationStore> = match &config.database_url {
        Some(database_url) => {
            let pool = civic_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            civic_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            civic_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgNotificationStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, notifications are kept in memory only");
            Arc::new(MemoryNotificationStore::new())
        }
    };

    // --- App state (gateway, event bus, notification service) ---
    let state = AppState::new(config.clone(), store);
    let cancel = CancellationToken::new();

    // --- Background tasks ---
    let heartbeat_handle = ws::start_heartbeat(
        Arc::clone(&state.gateway),
        Duration::from_secs(config.heartbeat_interval_secs),
        cancel.child_token(),
    );

    let router_handle = tokio::spawn(
        EventRouter::new(Arc::clone(&state.gateway))
            .run(state.event_bus.subscribe(), cancel.child_token()),
    );

    let chain_handle = tokio::spawn(
        Arc::clone(&state.notifications).run(state.event_bus.subscribe(), cancel.child_token()),
    );

    let sweep_handle = tokio::spawn(expiry_sweep::run(
        Arc::clone(&state.notifications),
        Duration::from_secs(config.expiry_sweep_interval_secs),
        cancel.child_token(),
    ));

    tracing::info!("Realtime services started (heartbeat, event router, chain notifications, expiry sweep)");

    let gateway = Arc::clone(&state.gateway);
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    for (name, handle) in [
        ("heartbeat", heartbeat_handle),
        ("event router", router_handle),
        ("chain notifications", chain_handle),
        ("expiry sweep", sweep_handle),
    ] {
        if tokio::time::timeout(drain, handle).await.is_err() {
            tracing::warn!(task = name, "Background task did not stop in time");
        }
    }
    tracing::info!("Background tasks stopped");

    let ws_count = gateway.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket sessions");
    gateway.shutdown_all().await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
