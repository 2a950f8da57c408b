use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use thumbnail_gate::{trigger_handler, AccessTokenSource, ThumbnailConfig, ThumbnailPipeline};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received, stopping server...");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,thumbnail_gate=debug"));
    fmt().with_env_filter(env_filter).with_target(true).init();

    let config = ThumbnailConfig::from_env().context("Failed to load configuration")?;
    let auth = AccessTokenSource::from_env(config.http_client()?);
    let pipeline = Arc::new(
        ThumbnailPipeline::from_config(&config, auth).context("Failed to create clients")?,
    );

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_addr))?;

    info!("Thumbnail gate starting on {}", addr);
    info!(
        "Destination: gs://{}/{}-<name>, max width {}px",
        config.destination_bucket, config.prefix, config.max_width
    );
    if pipeline.notifies() {
        info!(
            "Announcements: projects/{}/topics/{}",
            config.project_id, config.topic_id
        );
    } else {
        info!("Announcements: disabled");
    }

    let app = trigger_handler::router(pipeline);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Clean shutdown complete");
    Ok(())
}
