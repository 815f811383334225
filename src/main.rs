use std::net::SocketAddr;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use formgate::config::Config;
use formgate::reconcile;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env().expect("Failed to load configuration");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!("Starting formgate");

    let addr = SocketAddr::new(config.host, config.port);
    let sync_on_start = config.sync_on_start;
    let (app, state) = formgate::build_app(config);

    // Drain anything queued while the process was down.
    if sync_on_start && state.store.is_configured() {
        let state = state.clone();
        tokio::spawn(async move {
            let reports = reconcile::run_all(&state.store, &state.queue).await;
            let replayed: usize = reports.iter().map(|r| r.success).sum();
            let remaining: usize = reports.iter().map(|r| r.failed).sum();
            if replayed > 0 || remaining > 0 {
                tracing::info!("Startup reconciliation: {replayed} replayed, {remaining} still queued");
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
