use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use brain_intake_core::{
    AuthenticatedUser, FileFilter, IntakeError, IntakeGate, IntakeOutcome, IntakeService,
    QuotaCalculator, StoredDocumentRecord, UploadRequest,
};
use brain_intake_store::DocumentDatabase;
use tempfile::TempDir;
use tracing::debug;

pub const BENCH_USER: &str = "bench@example.com";

/// `count` records where every fourth one repeats its predecessor, so the
/// deduplication path is exercised.
pub fn synthetic_records(count: usize) -> Vec<StoredDocumentRecord> {
    (0..count)
        .map(|i| {
            let n = if i % 4 == 3 { i - 1 } else { i };
            StoredDocumentRecord::new(format!("doc-{n}.pdf"), (n as f64 + 1.0) * 1024.0)
        })
        .collect()
}

/// Filter stand-in that accepts everything without I/O.
pub struct AcceptAllFilter;

#[async_trait]
impl FileFilter for AcceptAllFilter {
    async fn filter_file(
        &self,
        _user: &AuthenticatedUser,
        upload: &UploadRequest,
    ) -> Result<IntakeOutcome, IntakeError> {
        Ok(IntakeOutcome::success(format!(
            "{} has been uploaded",
            upload.file_name
        )))
    }
}

/// A SQLite document store in a scratch directory, seeded for one user.
pub struct QuotaBenchFixture {
    pub store: Arc<DocumentDatabase>,
    pub user: AuthenticatedUser,
    pub temp_dir: TempDir,
}

impl QuotaBenchFixture {
    pub fn new(record_count: usize) -> Result<Self> {
        let temp_dir = TempDir::new().context("failed to create bench directory")?;
        let store = Arc::new(
            DocumentDatabase::new(temp_dir.path()).context("failed to open document store")?,
        );

        for record in synthetic_records(record_count) {
            store
                .insert_document(BENCH_USER, None, &record)
                .context("failed to seed document store")?;
        }
        debug!(record_count, path = %store.path().display(), "bench store seeded");

        Ok(Self {
            store,
            user: AuthenticatedUser::new(BENCH_USER)?,
            temp_dir,
        })
    }

    pub fn calculator(&self) -> QuotaCalculator {
        QuotaCalculator::new(self.store.clone())
    }

    pub fn intake_service(&self, max_brain_size: f64) -> IntakeService {
        IntakeService::new(
            self.store.clone(),
            Arc::new(AcceptAllFilter),
            IntakeGate::new(max_brain_size),
        )
    }
}
