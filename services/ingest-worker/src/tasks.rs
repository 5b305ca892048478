use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use brain_intake_core::{
    AuthenticatedUser, GateDecision, IngestTask, IntakeError, IntakeOutcome, IntakeService,
    NotificationMessage, NotificationSink, NotificationUpdate, ProcessCrawlJob, ProcessFileJob,
    RepositoryProcessor, UploadRequest,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::crawl::{CrawlError, CrawlWebsite, Crawler};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid base64 file payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("invalid job payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Crawl(#[from] CrawlError),

    #[error("failed to encode notification: {0}")]
    Notification(#[from] serde_json::Error),
}

/// Everything the two job handlers need, shared across concurrent jobs.
pub struct TaskContext {
    intake: IntakeService,
    repositories: Arc<dyn RepositoryProcessor>,
    notifications: Arc<dyn NotificationSink>,
    crawler: Crawler,
    enforce_quota: bool,
}

impl TaskContext {
    pub fn new(
        intake: IntakeService,
        repositories: Arc<dyn RepositoryProcessor>,
        notifications: Arc<dyn NotificationSink>,
        crawler: Crawler,
        enforce_quota: bool,
    ) -> Self {
        Self {
            intake,
            repositories,
            notifications,
            crawler,
            enforce_quota,
        }
    }

    /// Runs one decoded task. `Ok(true)` is the task's success marker.
    pub async fn run(&self, task: &IngestTask) -> Result<bool, TaskError> {
        match task {
            IngestTask::ProcessFile(job) => self.process_file_and_notify(job).await,
            IngestTask::ProcessCrawl(job) => self.process_crawl_and_notify(job).await,
        }
    }

    pub async fn process_file_and_notify(&self, job: &ProcessFileJob) -> Result<bool, TaskError> {
        let user = AuthenticatedUser::new(job.user_email.as_str())?;
        let content = STANDARD.decode(job.file.as_bytes())?;

        let upload = UploadRequest::new(job.file_name.clone(), content)
            .with_summarization(job.enable_summarization)
            .with_brain_id(job.brain_id.clone())
            .with_api_key(job.openai_api_key.clone());

        let outcome = self.ingest(&user, &upload).await?;
        info!(
            user = %user,
            file_name = %job.file_name,
            outcome = outcome.kind(),
            "file job processed"
        );

        self.notify(job.notification_id.as_deref(), &outcome, &job.file_name)?;
        Ok(true)
    }

    pub async fn process_crawl_and_notify(
        &self,
        job: &ProcessCrawlJob,
    ) -> Result<bool, TaskError> {
        let user = AuthenticatedUser::new(job.user_email.as_str())?;
        let site = CrawlWebsite::parse(&job.crawl_website_url)?;

        let outcome = if site.is_repository_host() {
            self.process_repository(&user, &site, job).await?
        } else {
            let page = self.crawler.fetch(&site).await?;
            let content = page.read().await?;
            let upload = UploadRequest::new(page.file_name(), content)
                .with_summarization(job.enable_summarization)
                .with_brain_id(job.brain_id.clone())
                .with_api_key(job.openai_api_key.clone());
            self.ingest(&user, &upload).await?
        };

        info!(
            user = %user,
            url = %job.crawl_website_url,
            outcome = outcome.kind(),
            "crawl job processed"
        );

        self.notify(
            job.notification_id.as_deref(),
            &outcome,
            &job.crawl_website_url,
        )?;
        Ok(true)
    }

    async fn ingest(
        &self,
        user: &AuthenticatedUser,
        upload: &UploadRequest,
    ) -> Result<IntakeOutcome, IntakeError> {
        if self.enforce_quota {
            self.intake.ingest(user, upload).await
        } else {
            self.intake.ingest_ungated(user, upload).await
        }
    }

    /// Repository size is unknown up front, so only a brain that is already
    /// full is turned away.
    async fn process_repository(
        &self,
        user: &AuthenticatedUser,
        site: &CrawlWebsite,
        job: &ProcessCrawlJob,
    ) -> Result<IntakeOutcome, IntakeError> {
        if self.enforce_quota {
            if let GateDecision::Reject(outcome) = self.intake.check_admission(user, 0.0)? {
                warn!(user = %user, url = %site, "repository crawl rejected by brain quota");
                return Ok(outcome);
            }
        }

        self.repositories
            .process_repository(
                user,
                site.as_str(),
                job.brain_id.as_deref(),
                job.openai_api_key.as_deref(),
            )
            .await
    }

    fn notify(
        &self,
        notification_id: Option<&str>,
        outcome: &IntakeOutcome,
        name: &str,
    ) -> Result<(), TaskError> {
        let Some(notification_id) = notification_id else {
            return Ok(());
        };

        let message = NotificationMessage::from_outcome(outcome, name);
        let update = NotificationUpdate::done(&message)?;
        self.notifications
            .update_notification(notification_id, &update)?;
        Ok(())
    }
}
