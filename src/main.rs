use auth_service::{api::create_router, config::Config, db::create_pool, observability};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // Initialize logging and the tracing pipeline before the listener binds
    // so early spans are captured
    let telemetry = observability::init(&config.log, &config.telemetry);

    tracing::info!("Starting auth service");

    // Database connectivity must be established before accepting traffic.
    // No retry: an unreachable database at startup is fatal.
    let db_pool = match create_pool(&config.database, &config.telemetry.instrumentation).await {
        Ok(pool) => {
            tracing::info!("Database connected successfully");
            pool
        }
        Err(e) => {
            tracing::error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    // Create router
    let app = create_router(db_pool, &config);

    // Bind server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server running on port {}", config.server.port);
    tracing::info!("Environment: {}", config.telemetry.environment);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Flush buffered spans before exit, on the error path as well
    telemetry.shutdown().await;

    served.map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves when a termination signal arrives.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for ctrl+c");
        tracing::info!("Received Ctrl+C, initiating shutdown...");
    }
}
