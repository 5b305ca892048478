use anyhow::{Context, Result};
use brain_intake_upload_api::config::UploadApiConfig;
use brain_intake_upload_api::server::UploadServer;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = UploadApiConfig::from_env().context("Failed to load configuration")?;

    init_tracing(&config.log_level);

    info!(
        data_dir = %config.data_dir.display(),
        broker = %config.broker_url,
        result_backend = %config.result_backend_url,
        "brain-intake upload API starting"
    );

    let server = UploadServer::new(config).context("Failed to create upload server")?;
    server.run_until(shutdown_signal()).await?;

    info!("brain-intake upload API stopped");
    Ok(())
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_line_number(true)
        .compact()
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
