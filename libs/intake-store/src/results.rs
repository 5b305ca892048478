use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::error::StorageError;
use super::location::sqlite_path;
use super::schema::{init_job_results, open_database};

/// Outcome of one job run: `success` is the task's boolean result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskResult {
    pub job_id: String,
    pub task_name: String,
    pub success: bool,
    pub error: Option<String>,
    pub finished_at: String,
}

pub struct ResultBackend {
    db_path: PathBuf,
    conn: Mutex<Connection>,
}

impl ResultBackend {
    pub fn open(location: &str) -> Result<Self, StorageError> {
        let db_path = sqlite_path(location)?;
        let conn = open_database(&db_path, init_job_results)?;

        Ok(Self {
            db_path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn store_result(
        &self,
        job_id: &str,
        task_name: &str,
        success: bool,
        error: Option<&str>,
    ) -> Result<(), StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;

        conn.execute(
            r#"
            INSERT INTO job_results (job_id, task_name, success, error, finished_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(job_id) DO UPDATE SET
                success = excluded.success,
                error = excluded.error,
                finished_at = excluded.finished_at
            "#,
            params![job_id, task_name, success, error, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_result(&self, job_id: &str) -> Result<Option<TaskResult>, StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;

        let result = conn
            .query_row(
                r#"
                SELECT job_id, task_name, success, error, finished_at
                FROM job_results
                WHERE job_id = ?1
                "#,
                params![job_id],
                |row| {
                    Ok(TaskResult {
                        job_id: row.get(0)?,
                        task_name: row.get(1)?,
                        success: row.get(2)?,
                        error: row.get(3)?,
                        finished_at: row.get(4)?,
                    })
                },
            )
            .optional()?;

        Ok(result)
    }
}
