use std::path::{Path, PathBuf};
use std::sync::Mutex;

use brain_intake_core::IngestTask;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::StorageError;
use super::location::sqlite_path;
use super::schema::{init_job_queue, open_database};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "done" => Some(JobStatus::Done),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub job_id: String,
    pub task_name: String,
    pub status: JobStatus,
    pub created_at: String,
    pub claimed_at: Option<String>,
    pub finished_at: Option<String>,
}

/// A job taken off the queue by a worker.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub job_id: String,
    pub task_name: String,
    pub payload: String,
}

impl ClaimedJob {
    pub fn task(&self) -> Result<IngestTask, StorageError> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Durable FIFO job queue in SQLite.
///
/// A job moves `queued -> running -> done | failed` exactly once; claiming is a
/// single UPDATE so two workers never receive the same row.
pub struct JobBroker {
    db_path: PathBuf,
    conn: Mutex<Connection>,
}

impl JobBroker {
    /// Opens the broker at a `sqlite://` location or plain path.
    pub fn open(location: &str) -> Result<Self, StorageError> {
        let db_path = sqlite_path(location)?;
        let conn = open_database(&db_path, init_job_queue)?;

        info!(path = %db_path.display(), "job broker opened");
        Ok(Self {
            db_path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn enqueue(&self, task: &IngestTask) -> Result<String, StorageError> {
        let payload = serde_json::to_string(task)?;
        let job_id = Uuid::new_v4().to_string();

        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;
        conn.execute(
            r#"
            INSERT INTO job_queue (job_id, task_name, payload, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                job_id,
                task.name(),
                payload,
                JobStatus::Queued.as_str(),
                Utc::now().to_rfc3339()
            ],
        )?;

        debug!(job_id = %job_id, task = task.name(), "job enqueued");
        Ok(job_id)
    }

    /// Claims the oldest queued job, if any.
    pub fn claim_next(&self) -> Result<Option<ClaimedJob>, StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;

        let claimed = conn
            .query_row(
                r#"
                UPDATE job_queue
                SET status = ?1, claimed_at = ?2
                WHERE seq = (
                    SELECT seq FROM job_queue
                    WHERE status = ?3
                    ORDER BY seq
                    LIMIT 1
                )
                RETURNING job_id, task_name, payload
                "#,
                params![
                    JobStatus::Running.as_str(),
                    Utc::now().to_rfc3339(),
                    JobStatus::Queued.as_str()
                ],
                |row| {
                    Ok(ClaimedJob {
                        job_id: row.get(0)?,
                        task_name: row.get(1)?,
                        payload: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(claimed)
    }

    pub fn mark_finished(&self, job_id: &str, status: JobStatus) -> Result<(), StorageError> {
        if !status.is_terminal() {
            return Err(StorageError::InvalidRecord(format!(
                "{} is not a terminal job status",
                status.as_str()
            )));
        }

        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;
        let changed = conn.execute(
            r#"
            UPDATE job_queue
            SET status = ?1, finished_at = ?2
            WHERE job_id = ?3 AND status = ?4
            "#,
            params![
                status.as_str(),
                Utc::now().to_rfc3339(),
                job_id,
                JobStatus::Running.as_str()
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::NotFound(format!("running job {job_id}")));
        }
        Ok(())
    }

    pub fn job_status(&self, job_id: &str) -> Result<Option<JobRecord>, StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;

        let row = conn
            .query_row(
                r#"
                SELECT job_id, task_name, status, created_at, claimed_at, finished_at
                FROM job_queue
                WHERE job_id = ?1
                "#,
                params![job_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((job_id, task_name, status, created_at, claimed_at, finished_at)) = row else {
            return Ok(None);
        };
        let status = JobStatus::parse(&status)
            .ok_or_else(|| StorageError::InvalidRecord(format!("unknown job status: {status}")))?;

        Ok(Some(JobRecord {
            job_id,
            task_name,
            status,
            created_at,
            claimed_at,
            finished_at,
        }))
    }

    pub fn pending_count(&self) -> Result<u64, StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM job_queue WHERE status = ?1",
            params![JobStatus::Queued.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use brain_intake_core::{ProcessCrawlJob, PROCESS_CRAWL_TASK};
    use tempfile::tempdir;

    use super::*;

    fn crawl_task(url: &str) -> IngestTask {
        IngestTask::ProcessCrawl(ProcessCrawlJob {
            crawl_website_url: url.into(),
            enable_summarization: false,
            brain_id: None,
            openai_api_key: None,
            notification_id: None,
            user_email: "ada@example.com".into(),
        })
    }

    fn open_broker(dir: &Path) -> JobBroker {
        let location = format!("sqlite://{}", dir.join("broker.db").display());
        JobBroker::open(&location).expect("broker")
    }

    #[test]
    fn jobs_are_claimed_in_enqueue_order() {
        let dir = tempdir().expect("tempdir");
        let broker = open_broker(dir.path());

        let first = broker.enqueue(&crawl_task("https://one.example")).unwrap();
        let second = broker.enqueue(&crawl_task("https://two.example")).unwrap();
        assert_eq!(broker.pending_count().unwrap(), 2);

        let claimed = broker.claim_next().unwrap().unwrap();
        assert_eq!(claimed.job_id, first);
        assert_eq!(claimed.task_name, PROCESS_CRAWL_TASK);
        assert_eq!(claimed.task().unwrap(), crawl_task("https://one.example"));

        let claimed = broker.claim_next().unwrap().unwrap();
        assert_eq!(claimed.job_id, second);
        assert!(broker.claim_next().unwrap().is_none());
    }

    #[test]
    fn a_job_is_claimed_once() {
        let dir = tempdir().expect("tempdir");
        let broker = open_broker(dir.path());
        let other = open_broker(dir.path());

        let job_id = broker.enqueue(&crawl_task("https://one.example")).unwrap();
        let claimed = broker.claim_next().unwrap().unwrap();
        assert_eq!(claimed.job_id, job_id);
        assert!(other.claim_next().unwrap().is_none());

        let record = other.job_status(&job_id).unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Running);
        assert!(record.claimed_at.is_some());
    }

    #[test]
    fn finishing_is_terminal() {
        let dir = tempdir().expect("tempdir");
        let broker = open_broker(dir.path());

        let job_id = broker.enqueue(&crawl_task("https://one.example")).unwrap();
        assert!(matches!(
            broker.mark_finished(&job_id, JobStatus::Done),
            Err(StorageError::NotFound(_))
        ));

        broker.claim_next().unwrap();
        broker.mark_finished(&job_id, JobStatus::Failed).unwrap();
        assert_eq!(
            broker.job_status(&job_id).unwrap().unwrap().status,
            JobStatus::Failed
        );
        assert!(broker.mark_finished(&job_id, JobStatus::Done).is_err());
        assert!(matches!(
            broker.mark_finished(&job_id, JobStatus::Queued),
            Err(StorageError::InvalidRecord(_))
        ));
    }

    #[test]
    fn unknown_job_has_no_status() {
        let dir = tempdir().expect("tempdir");
        let broker = open_broker(dir.path());
        assert!(broker.job_status("missing").unwrap().is_none());
    }
}
