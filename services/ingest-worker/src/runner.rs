use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use brain_intake_core::{HttpFileFilter, HttpRepositoryProcessor, IntakeGate, IntakeService};
use brain_intake_store::{
    ClaimedJob, DocumentDatabase, JobBroker, JobStatus, NotificationStore, ResultBackend,
    StorageError,
};
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::crawl::Crawler;
use crate::tasks::{TaskContext, TaskError};

/// Polls the broker and runs claimed jobs, recording each job's result.
pub struct JobRunner {
    broker: Arc<JobBroker>,
    results: Arc<ResultBackend>,
    context: Arc<TaskContext>,
    poll_interval: Duration,
    concurrency: usize,
}

impl JobRunner {
    pub fn new(
        broker: Arc<JobBroker>,
        results: Arc<ResultBackend>,
        context: Arc<TaskContext>,
        poll_interval: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            broker,
            results,
            context,
            poll_interval,
            concurrency: concurrency.max(1),
        }
    }

    /// Opens the stores and collaborators named by `config`.
    pub fn from_config(config: &WorkerConfig) -> Result<Self> {
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
        let repositories = Arc::new(
            HttpRepositoryProcessor::new(&config.filter_service_url, config.filter_timeout())
                .context("failed to build repository client")?,
        );
        let crawler = Crawler::new(config.crawl_timeout(), config.max_crawl_bytes)
            .context("failed to build crawler")?;

        let intake = IntakeService::new(documents, filter, IntakeGate::new(config.max_brain_size));
        let context = Arc::new(TaskContext::new(
            intake,
            repositories,
            notifications,
            crawler,
            config.enforce_job_quota,
        ));

        Ok(Self::new(
            broker,
            results,
            context,
            config.poll_interval(),
            config.concurrency,
        ))
    }

    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                match self.run_once().await {
                    Ok(count) if count > 0 => {
                        info!(count, "processed queued jobs");
                    }
                    Ok(_) => {
                        debug!("no queued jobs");
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to poll job broker");
                    }
                }
            }
        })
    }

    /// Claims up to `concurrency` jobs and runs them to completion.
    pub async fn run_once(&self) -> Result<usize, StorageError> {
        let mut claimed = Vec::with_capacity(self.concurrency);
        while claimed.len() < self.concurrency {
            match self.broker.claim_next()? {
                Some(job) => claimed.push(job),
                None => break,
            }
        }

        let count = claimed.len();
        join_all(claimed.into_iter().map(|job| self.execute(job))).await;
        Ok(count)
    }

    async fn execute(&self, job: ClaimedJob) {
        debug!(job_id = %job.job_id, task = %job.task_name, "job started");

        let outcome = match job.task() {
            Ok(task) => self.context.run(&task).await,
            Err(err) => Err(TaskError::Payload(err.to_string())),
        };

        let (status, stored) = match outcome {
            Ok(success) => {
                info!(job_id = %job.job_id, task = %job.task_name, success, "job finished");
                (
                    JobStatus::Done,
                    self.results
                        .store_result(&job.job_id, &job.task_name, success, None),
                )
            }
            Err(err) => {
                error!(job_id = %job.job_id, task = %job.task_name, error = %err, "job failed");
                let message = err.to_string();
                (
                    JobStatus::Failed,
                    self.results
                        .store_result(&job.job_id, &job.task_name, false, Some(&message)),
                )
            }
        };

        if let Err(err) = stored {
            warn!(job_id = %job.job_id, error = %err, "failed to store job result");
        }
        if let Err(err) = self.broker.mark_finished(&job.job_id, status) {
            warn!(job_id = %job.job_id, error = %err, "failed to mark job finished");
        }
    }
}
