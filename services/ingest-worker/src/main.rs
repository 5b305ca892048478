use anyhow::{Context, Result};
use brain_intake_worker::config::WorkerConfig;
use brain_intake_worker::runner::JobRunner;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = WorkerConfig::from_env().context("Failed to load configuration")?;

    init_tracing(&config.log_level);

    info!(
        broker = %config.broker_url,
        result_backend = %config.result_backend_url,
        concurrency = config.concurrency,
        enforce_job_quota = config.enforce_job_quota,
        "brain-intake worker starting"
    );

    let runner = JobRunner::from_config(&config).context("Failed to create job runner")?;
    let handle = runner.start();

    shutdown_signal().await;
    handle.abort();
    let _ = handle.await;

    info!("brain-intake worker stopped");
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
