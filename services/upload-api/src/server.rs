use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{create_router, ApiState};
use crate::config::UploadApiConfig;

pub struct UploadServer {
    state: Arc<ApiState>,
}

impl UploadServer {
    pub fn new(config: UploadApiConfig) -> Result<Self> {
        let state = ApiState::from_config(config).context("failed to initialise upload API")?;
        Ok(Self {
            state: Arc::new(state),
        })
    }

    pub fn state(&self) -> Arc<ApiState> {
        Arc::clone(&self.state)
    }

    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind to {addr}"))?;

        info!(
            addr = %addr,
            filter = %self.state.config.filter_service_url,
            max_brain_size = self.state.config.max_brain_size,
            "upload API listening"
        );

        let router = create_router(Arc::clone(&self.state));
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("upload API server error")?;

        info!("upload API stopped");
        Ok(())
    }
}
