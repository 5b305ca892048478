use std::sync::Arc;

use anyhow::{Context, Result};
use brain_intake_core::{HttpFileFilter, IntakeGate, IntakeService};
use brain_intake_store::{DocumentDatabase, JobBroker, NotificationStore, ResultBackend};

pub mod handlers;
pub mod router;
pub mod types;

pub use handlers::*;
pub use router::create_router;
pub use types::*;

use crate::auth::JwtVerifier;
use crate::config::UploadApiConfig;

pub struct ApiState {
    pub intake: IntakeService,
    pub notifications: Arc<NotificationStore>,
    pub broker: Arc<JobBroker>,
    pub results: Arc<ResultBackend>,
    pub jwt: JwtVerifier,
    pub config: Arc<UploadApiConfig>,
}

impl ApiState {
    /// Opens every store named by `config` and wires the HTTP filter client.
    pub fn from_config(config: UploadApiConfig) -> Result<Self> {
        let documents = Arc::new(
            DocumentDatabase::new(&config.data_dir).context("failed to open document store")?,
        );
        let notifications = Arc::new(
            NotificationStore::new(&config.data_dir)
                .context("failed to open notification store")?,
        );
        let broker =
            Arc::new(JobBroker::open(&config.broker_url).context("failed to open job broker")?);
        let results = Arc::new(
            ResultBackend::open(&config.result_backend_url)
                .context("failed to open result backend")?,
        );
        let filter = Arc::new(
            HttpFileFilter::new(&config.filter_service_url, config.filter_timeout())
                .context("failed to build filter client")?,
        );

        let intake = IntakeService::new(documents, filter, IntakeGate::new(config.max_brain_size));
        let jwt = JwtVerifier::new(&config);

        Ok(Self {
            intake,
            notifications,
            broker,
            results,
            jwt,
            config: Arc::new(config),
        })
    }
}
