use std::path::Path;

use rusqlite::Connection;

use super::error::StorageError;

pub const DOCUMENTS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    brain_id TEXT,
    file_name TEXT NOT NULL,
    file_size REAL NOT NULL,
    status TEXT NOT NULL DEFAULT 'stored',
    created_at TEXT NOT NULL
);
"#;

pub const DOCUMENTS_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_documents_user ON documents(user_id);
"#;

pub const NOTIFICATIONS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    message TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

pub const JOB_QUEUE_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS job_queue (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL UNIQUE,
    task_name TEXT NOT NULL,
    payload TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    claimed_at TEXT,
    finished_at TEXT
);
"#;

pub const JOB_QUEUE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_job_queue_status ON job_queue(status, seq);
"#;

pub const JOB_RESULTS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS job_results (
    job_id TEXT PRIMARY KEY,
    task_name TEXT NOT NULL,
    success INTEGER NOT NULL,
    error TEXT,
    finished_at TEXT NOT NULL
);
"#;

pub fn init_documents(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(DOCUMENTS_TABLE_SCHEMA)?;
    conn.execute_batch(DOCUMENTS_INDEXES)?;
    Ok(())
}

pub fn init_notifications(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(NOTIFICATIONS_TABLE_SCHEMA)
}

pub fn init_job_queue(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(JOB_QUEUE_TABLE_SCHEMA)?;
    conn.execute_batch(JOB_QUEUE_INDEXES)?;
    Ok(())
}

pub fn init_job_results(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(JOB_RESULTS_TABLE_SCHEMA)
}

/// Opens (creating if needed) a WAL-mode database and applies `init`.
///
/// Every store opens its own connection, so the upload API and the worker can
/// share one file.
pub fn open_database(
    db_path: &Path,
    init: fn(&Connection) -> rusqlite::Result<()>,
) -> Result<Connection, StorageError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    init(&conn)?;
    Ok(conn)
}
