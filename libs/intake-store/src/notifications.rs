use std::path::{Path, PathBuf};
use std::sync::Mutex;

use brain_intake_core::{IntakeError, NotificationSink, NotificationStatus, NotificationUpdate};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::error::StorageError;
use super::schema::{init_notifications, open_database};
use super::NOTIFICATIONS_DB_FILENAME;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    pub notification_id: String,
    pub status: NotificationStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Notification records shared by the upload API (creates them) and the
/// worker (completes them).
pub struct NotificationStore {
    db_path: PathBuf,
    conn: Mutex<Connection>,
}

impl NotificationStore {
    pub fn new(data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join(NOTIFICATIONS_DB_FILENAME);
        let conn = open_database(&db_path, init_notifications)?;

        Ok(Self {
            db_path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Inserts a `Pending` notification and returns it.
    pub fn create(&self) -> Result<NotificationRecord, StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;
        let now = Utc::now();
        let record = NotificationRecord {
            notification_id: Uuid::new_v4().to_string(),
            status: NotificationStatus::Pending,
            message: None,
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            r#"
            INSERT INTO notifications (notification_id, status, message, created_at, updated_at)
            VALUES (?1, ?2, NULL, ?3, ?3)
            "#,
            params![
                record.notification_id,
                record.status.as_str(),
                now.to_rfc3339()
            ],
        )?;

        Ok(record)
    }

    pub fn get(&self, notification_id: &str) -> Result<Option<NotificationRecord>, StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;

        let row = conn
            .query_row(
                r#"
                SELECT notification_id, status, message, created_at, updated_at
                FROM notifications
                WHERE notification_id = ?1
                "#,
                params![notification_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((notification_id, status, message, created_at, updated_at)) = row else {
            return Ok(None);
        };

        let status = NotificationStatus::parse(&status).ok_or_else(|| {
            StorageError::InvalidRecord(format!("unknown notification status: {status}"))
        })?;

        Ok(Some(NotificationRecord {
            notification_id,
            status,
            message,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }

    pub fn update_by_id(
        &self,
        notification_id: &str,
        update: &NotificationUpdate,
    ) -> Result<(), StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;

        let changed = conn.execute(
            r#"
            UPDATE notifications
            SET status = ?1, message = ?2, updated_at = ?3
            WHERE notification_id = ?4
            "#,
            params![
                update.status.as_str(),
                update.message,
                Utc::now().to_rfc3339(),
                notification_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::NotFound(format!(
                "notification {notification_id}"
            )));
        }

        debug!(
            notification_id,
            status = update.status.as_str(),
            "notification updated"
        );
        Ok(())
    }

    /// Removes a notification; `false` when it did not exist.
    pub fn delete(&self, notification_id: &str) -> Result<bool, StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StorageError::ConnectionPoisoned)?;
        let changed = conn.execute(
            "DELETE FROM notifications WHERE notification_id = ?1",
            params![notification_id],
        )?;
        Ok(changed > 0)
    }
}

impl NotificationSink for NotificationStore {
    fn update_notification(
        &self,
        notification_id: &str,
        update: &NotificationUpdate,
    ) -> Result<(), IntakeError> {
        self.update_by_id(notification_id, update)
            .map_err(|err| IntakeError::Notification(err.to_string()))
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| StorageError::InvalidRecord(format!("bad timestamp {value}: {err}")))
}

#[cfg(test)]
mod tests {
    use brain_intake_core::{IntakeOutcome, NotificationMessage};
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn created_notifications_start_pending() {
        let dir = tempdir().expect("tempdir");
        let store = NotificationStore::new(dir.path()).expect("store");

        let created = store.create().unwrap();
        let fetched = store.get(&created.notification_id).unwrap().unwrap();

        assert_eq!(fetched.status, NotificationStatus::Pending);
        assert!(fetched.message.is_none());
    }

    #[test]
    fn completion_stores_summary() {
        let dir = tempdir().expect("tempdir");
        let store = NotificationStore::new(dir.path()).expect("store");
        let created = store.create().unwrap();

        let summary = NotificationMessage::from_outcome(
            &IntakeOutcome::success("report.pdf has been uploaded"),
            "report.pdf",
        );
        store
            .update_notification(
                &created.notification_id,
                &NotificationUpdate::done(&summary).unwrap(),
            )
            .unwrap();

        let fetched = store.get(&created.notification_id).unwrap().unwrap();
        assert_eq!(fetched.status, NotificationStatus::Done);
        let stored: NotificationMessage =
            serde_json::from_str(fetched.message.as_deref().unwrap()).unwrap();
        assert_eq!(stored, summary);
    }

    #[test]
    fn updating_unknown_notification_fails() {
        let dir = tempdir().expect("tempdir");
        let store = NotificationStore::new(dir.path()).expect("store");
        let update = NotificationUpdate {
            status: NotificationStatus::Done,
            message: None,
        };

        assert!(matches!(
            store.update_by_id("missing", &update),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.update_notification("missing", &update),
            Err(IntakeError::Notification(_))
        ));
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn deleted_notifications_are_gone() {
        let dir = tempdir().expect("tempdir");
        let store = NotificationStore::new(dir.path()).expect("store");
        let created = store.create().unwrap();

        assert!(store.delete(&created.notification_id).unwrap());
        assert!(store.get(&created.notification_id).unwrap().is_none());
        assert!(!store.delete(&created.notification_id).unwrap());
    }
}
