use std::path::{Path, PathBuf};
use std::sync::Mutex;

use brain_intake_core::{
    brain_usage, DocumentStore, GateDecision, IntakeGate, Reservation, ReservationId, StoreError,
    StoredDocumentRecord,
};
use chrono::Utc;
use rusqlite::{params, Connection, TransactionBehavior};
use tracing::debug;

use super::error::StorageError;
use super::schema::{init_documents, open_database};
use super::DOCUMENTS_DB_FILENAME;

const STATUS_STORED: &str = "stored";
const STATUS_PENDING: &str = "pending";

/// Record store of ingested documents, one row per completed intake plus one
/// `pending` row per intake still waiting on the filter.
pub struct DocumentDatabase {
    db_path: PathBuf,
    conn: Mutex<Connection>,
}

impl DocumentDatabase {
    pub fn new(data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join(DOCUMENTS_DB_FILENAME);
        let conn = open_database(&db_path, init_documents)?;

        Ok(Self {
            db_path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn insert_document(
        &self,
        user_email: &str,
        brain_id: Option<&str>,
        record: &StoredDocumentRecord,
    ) -> Result<(), StorageError> {
        validate_record(user_email, record)?;

        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;
        insert_row(&conn, user_email, brain_id, record, STATUS_STORED)?;

        debug!(
            user = user_email,
            file_name = %record.name,
            file_size = record.size,
            "recorded ingested document"
        );
        Ok(())
    }

    /// Every row counted toward `user_email`'s usage, pending rows included.
    pub fn documents_for_user(
        &self,
        user_email: &str,
    ) -> Result<Vec<StoredDocumentRecord>, StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;
        Ok(select_documents(&conn, user_email)?)
    }

    /// Runs the gate and inserts a pending row inside one immediate
    /// transaction. The write lock is held from the usage read to the insert,
    /// so other connections to the same file wait their turn.
    pub fn reserve(
        &self,
        user_email: &str,
        brain_id: Option<&str>,
        record: &StoredDocumentRecord,
        gate: &IntakeGate,
    ) -> Result<Reservation, StorageError> {
        validate_record(user_email, record)?;

        let mut conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let used = brain_usage(&select_documents(&tx, user_email)?);
        let remaining = match gate.evaluate(used, record.size) {
            GateDecision::Reject(outcome) => return Ok(Reservation::Rejected(outcome)),
            GateDecision::Admit { remaining } => remaining,
        };

        insert_row(&tx, user_email, brain_id, record, STATUS_PENDING)?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(
            user = user_email,
            file_name = %record.name,
            file_size = record.size,
            reservation = id,
            "reserved document"
        );
        Ok(Reservation::Held { id, remaining })
    }

    pub fn confirm(&self, id: ReservationId) -> Result<(), StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;
        let changed = conn.execute(
            "UPDATE documents SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![STATUS_STORED, id, STATUS_PENDING],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("reservation {id}")));
        }
        Ok(())
    }

    /// Removes a pending row. Releasing an unknown or already settled
    /// reservation is a no-op.
    pub fn release(&self, id: ReservationId) -> Result<(), StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;
        conn.execute(
            "DELETE FROM documents WHERE id = ?1 AND status = ?2",
            params![id, STATUS_PENDING],
        )?;
        Ok(())
    }

    pub fn pending_count(&self) -> Result<usize, StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE status = ?1",
            params![STATUS_PENDING],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn validate_record(user_email: &str, record: &StoredDocumentRecord) -> Result<(), StorageError> {
    if user_email.trim().is_empty() {
        return Err(StorageError::InvalidRecord("user id cannot be empty".into()));
    }
    if !record.size.is_finite() || record.size < 0.0 {
        return Err(StorageError::InvalidRecord(format!(
            "file size must be a non-negative number, got {}",
            record.size
        )));
    }
    Ok(())
}

fn insert_row(
    conn: &Connection,
    user_email: &str,
    brain_id: Option<&str>,
    record: &StoredDocumentRecord,
    status: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        INSERT INTO documents (user_id, brain_id, file_name, file_size, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            user_email,
            brain_id,
            record.name,
            record.size,
            status,
            Utc::now().to_rfc3339()
        ],
    )
}

fn select_documents(
    conn: &Connection,
    user_email: &str,
) -> rusqlite::Result<Vec<StoredDocumentRecord>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT file_name, file_size
        FROM documents
        WHERE user_id = ?1
        "#,
    )?;

    let rows = stmt.query_map(params![user_email], |row| {
        Ok(StoredDocumentRecord {
            name: row.get(0)?,
            size: row.get(1)?,
        })
    })?;
    rows.collect()
}

impl DocumentStore for DocumentDatabase {
    fn list_user_documents(
        &self,
        user_email: &str,
    ) -> Result<Vec<StoredDocumentRecord>, StoreError> {
        Ok(self.documents_for_user(user_email)?)
    }

    fn record_document(
        &self,
        user_email: &str,
        brain_id: Option<&str>,
        record: &StoredDocumentRecord,
    ) -> Result<(), StoreError> {
        Ok(self.insert_document(user_email, brain_id, record)?)
    }

    fn reserve_document(
        &self,
        user_email: &str,
        brain_id: Option<&str>,
        record: &StoredDocumentRecord,
        gate: &IntakeGate,
    ) -> Result<Reservation, StoreError> {
        Ok(self.reserve(user_email, brain_id, record, gate)?)
    }

    fn confirm_reservation(&self, id: ReservationId) -> Result<(), StoreError> {
        Ok(self.confirm(id)?)
    }

    fn release_reservation(&self, id: ReservationId) -> Result<(), StoreError> {
        Ok(self.release(id)?)
    }
}
