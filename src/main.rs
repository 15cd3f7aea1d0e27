use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use user_registry_server::{config::Config, create_app, database::Database, storage::BlobStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,user_registry_server=debug")),
        )
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    info!(
        environment = %config.environment,
        port = config.port,
        upload_dir = %config.upload_dir,
        "starting user registry"
    );

    // Connect eagerly so a bad DATABASE_URL fails here, not on the first
    // request. Schema setup is awaited and fatal when it cannot complete.
    let db = Database::new(&config)
        .await
        .context("failed to connect to database")?;
    db.ensure_schema()
        .await
        .context("schema initialization failed")?;

    let blobs = BlobStore::new(&config.upload_dir).context("failed to prepare upload directory")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("listening on {}", addr);

    let app = create_app(db.clone(), blobs, config);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // In-flight requests have drained; release the pool before exit.
    db.close().await;
    info!("shutdown complete");

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

    info!("shutdown signal received, draining connections");
}
