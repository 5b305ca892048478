use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::{IntakeError, StoreError};
use crate::model::{AuthenticatedUser, IntakeOutcome, StoredDocumentRecord, UploadRequest};
use crate::quota::QuotaCalculator;
use crate::traits::{DocumentStore, FileFilter};
use crate::units::convert_bytes;

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// The candidate fits; `remaining` is the free space before it lands.
    Admit { remaining: f64 },
    /// The candidate does not fit; the outcome is returned to the caller as is.
    Reject(IntakeOutcome),
}

/// Row id of a pending document held by [`DocumentStore::reserve_document`].
pub type ReservationId = i64;

#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    Held { id: ReservationId, remaining: f64 },
    Rejected(IntakeOutcome),
}

/// Compares a candidate size against the space left in a user's brain.
#[derive(Debug, Clone, Copy)]
pub struct IntakeGate {
    max_brain_size: f64,
}

impl IntakeGate {
    pub fn new(max_brain_size: f64) -> Self {
        Self { max_brain_size }
    }

    pub fn max_brain_size(&self) -> f64 {
        self.max_brain_size
    }

    pub fn evaluate(&self, used: f64, candidate_size: f64) -> GateDecision {
        let remaining = self.max_brain_size - used;
        if remaining - candidate_size < 0.0 {
            return GateDecision::Reject(IntakeOutcome::error(format!(
                "User's brain will exceed maximum capacity with this upload. Maximum file allowed is : {}",
                convert_bytes(remaining)
            )));
        }
        GateDecision::Admit { remaining }
    }
}

/// Releases a held reservation when dropped unless it was confirmed first.
/// A cancelled or failed intake therefore never keeps quota it did not use.
struct HeldReservation<'a> {
    store: &'a dyn DocumentStore,
    id: ReservationId,
    settled: bool,
}

impl HeldReservation<'_> {
    fn confirm(mut self) -> Result<(), StoreError> {
        self.settled = true;
        self.store.confirm_reservation(self.id)
    }
}

impl Drop for HeldReservation<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Err(err) = self.store.release_reservation(self.id) {
            warn!(reservation = self.id, error = %err, "failed to release document reservation");
        }
    }
}

/// Quota check followed by delegation to the filter collaborator.
#[derive(Clone)]
pub struct IntakeService {
    calculator: QuotaCalculator,
    gate: IntakeGate,
    filter: Arc<dyn FileFilter>,
}

impl IntakeService {
    pub fn new(store: Arc<dyn DocumentStore>, filter: Arc<dyn FileFilter>, gate: IntakeGate) -> Self {
        Self {
            calculator: QuotaCalculator::new(store),
            gate,
            filter,
        }
    }

    pub fn gate(&self) -> IntakeGate {
        self.gate
    }

    /// Gate decision for `candidate_size` against the user's current usage.
    /// Nothing is held; use [`IntakeService::ingest`] to admit a file.
    pub fn check_admission(
        &self,
        user: &AuthenticatedUser,
        candidate_size: f64,
    ) -> Result<GateDecision, IntakeError> {
        let used = self.calculator.current_usage(user)?;
        Ok(self.gate.evaluate(used, candidate_size))
    }

    /// Admits the upload by reserving its size in the record store, then hands
    /// it to the filter. The reservation becomes a stored document on a
    /// `success` outcome and is released otherwise, so concurrent intakes for
    /// one user cannot both spend the same free space.
    pub async fn ingest(
        &self,
        user: &AuthenticatedUser,
        upload: &UploadRequest,
    ) -> Result<IntakeOutcome, IntakeError> {
        validate_upload(upload)?;

        let store: &dyn DocumentStore = self.calculator.store().as_ref();
        let record = StoredDocumentRecord::new(upload.file_name.clone(), upload.size());
        let id = match store.reserve_document(
            user.email(),
            upload.brain_id.as_deref(),
            &record,
            &self.gate,
        )? {
            Reservation::Rejected(outcome) => {
                warn!(
                    user = %user,
                    file_name = %upload.file_name,
                    size = upload.size(),
                    max_brain_size = self.gate.max_brain_size(),
                    "upload rejected by brain quota"
                );
                return Ok(outcome);
            }
            Reservation::Held { id, remaining } => {
                info!(
                    user = %user,
                    file_name = %upload.file_name,
                    size = upload.size(),
                    remaining,
                    "upload admitted"
                );
                id
            }
        };

        let held = HeldReservation {
            store,
            id,
            settled: false,
        };
        let outcome = self.filter.filter_file(user, upload).await?;

        if outcome.is_success() {
            if let Err(err) = held.confirm() {
                // The pending row still counts toward the quota.
                error!(
                    user = %user,
                    file_name = %upload.file_name,
                    reservation = id,
                    error = %err,
                    "document ingested but its record was not confirmed"
                );
                return Err(err.into());
            }
        }

        Ok(outcome)
    }

    /// Delegates to the filter without consulting the quota.
    pub async fn ingest_ungated(
        &self,
        user: &AuthenticatedUser,
        upload: &UploadRequest,
    ) -> Result<IntakeOutcome, IntakeError> {
        validate_upload(upload)?;

        let outcome = self.filter.filter_file(user, upload).await?;

        if outcome.is_success() {
            let record = StoredDocumentRecord::new(upload.file_name.clone(), upload.size());
            if let Err(err) = self.calculator.store().record_document(
                user.email(),
                upload.brain_id.as_deref(),
                &record,
            ) {
                error!(
                    user = %user,
                    file_name = %upload.file_name,
                    size = upload.size(),
                    error = %err,
                    "document ingested but not recorded; it will not count toward the quota"
                );
                return Err(err.into());
            }
        }

        Ok(outcome)
    }
}

fn validate_upload(upload: &UploadRequest) -> Result<(), IntakeError> {
    if upload.file_name.trim().is_empty() {
        return Err(IntakeError::InvalidUpload("file name cannot be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::quota::brain_usage;

    const MB: f64 = 1024.0 * 1024.0;

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<Vec<StoredDocumentRecord>>,
        pending: Mutex<Vec<(ReservationId, StoredDocumentRecord)>>,
        next_id: AtomicI64,
        fail_confirm: bool,
    }

    impl MemoryStore {
        fn with(records: Vec<StoredDocumentRecord>) -> Self {
            Self {
                records: Mutex::new(records),
                ..Self::default()
            }
        }

        fn pending_count(&self) -> usize {
            self.pending.lock().unwrap().len()
        }
    }

    impl DocumentStore for MemoryStore {
        fn list_user_documents(
            &self,
            _user_email: &str,
        ) -> Result<Vec<StoredDocumentRecord>, StoreError> {
            let mut all = self.records.lock().unwrap().clone();
            all.extend(self.pending.lock().unwrap().iter().map(|(_, r)| r.clone()));
            Ok(all)
        }

        fn record_document(
            &self,
            _user_email: &str,
            _brain_id: Option<&str>,
            record: &StoredDocumentRecord,
        ) -> Result<(), StoreError> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn reserve_document(
            &self,
            _user_email: &str,
            _brain_id: Option<&str>,
            record: &StoredDocumentRecord,
            gate: &IntakeGate,
        ) -> Result<Reservation, StoreError> {
            let records = self.records.lock().unwrap();
            let mut pending = self.pending.lock().unwrap();
            let mut all = records.clone();
            all.extend(pending.iter().map(|(_, r)| r.clone()));

            match gate.evaluate(brain_usage(&all), record.size) {
                GateDecision::Reject(outcome) => Ok(Reservation::Rejected(outcome)),
                GateDecision::Admit { remaining } => {
                    let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                    pending.push((id, record.clone()));
                    Ok(Reservation::Held { id, remaining })
                }
            }
        }

        fn confirm_reservation(&self, id: ReservationId) -> Result<(), StoreError> {
            if self.fail_confirm {
                return Err(StoreError::Unavailable("disk full".into()));
            }
            let mut records = self.records.lock().unwrap();
            let mut pending = self.pending.lock().unwrap();
            let index = pending
                .iter()
                .position(|(pending_id, _)| *pending_id == id)
                .ok_or_else(|| StoreError::NotFound(format!("reservation {id}")))?;
            records.push(pending.remove(index).1);
            Ok(())
        }

        fn release_reservation(&self, id: ReservationId) -> Result<(), StoreError> {
            self.pending
                .lock()
                .unwrap()
                .retain(|(pending_id, _)| *pending_id != id);
            Ok(())
        }
    }

    struct CountingFilter {
        calls: AtomicUsize,
        outcome: Result<IntakeOutcome, String>,
        delay: Duration,
    }

    impl CountingFilter {
        fn returning(outcome: IntakeOutcome) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcome: Ok(outcome),
                delay: Duration::ZERO,
            }
        }

        fn failing(reason: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcome: Err(reason.to_string()),
                delay: Duration::ZERO,
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FileFilter for CountingFilter {
        async fn filter_file(
            &self,
            _user: &AuthenticatedUser,
            _upload: &UploadRequest,
        ) -> Result<IntakeOutcome, IntakeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.outcome.clone().map_err(IntakeError::Filter)
        }
    }

    fn user() -> AuthenticatedUser {
        AuthenticatedUser::new("ada@example.com").unwrap()
    }

    fn upload_of(size: f64) -> UploadRequest {
        named_upload("report.pdf", size)
    }

    fn named_upload(name: &str, size: f64) -> UploadRequest {
        UploadRequest::new(name, vec![0u8; size as usize])
    }

    #[test]
    fn gate_rejects_when_candidate_exceeds_remaining() {
        let gate = IntakeGate::new(100.0 * MB);
        match gate.evaluate(90.0 * MB, 20.0 * MB) {
            GateDecision::Reject(IntakeOutcome::Error { message }) => {
                assert!(message.contains("10.0 MB"), "message was {message}");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn gate_admits_exact_fit() {
        let gate = IntakeGate::new(100.0);
        assert_eq!(
            gate.evaluate(60.0, 40.0),
            GateDecision::Admit { remaining: 40.0 }
        );
    }

    #[test]
    fn gate_reports_zero_when_already_over_capacity() {
        let gate = IntakeGate::new(100.0);
        match gate.evaluate(150.0, 0.0) {
            GateDecision::Reject(outcome) => assert!(outcome.message().ends_with("0.0 B")),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn gate_decisions_around_the_capacity_boundary() {
        // (max, used, candidate, admitted)
        let cases: &[(f64, f64, f64, bool)] = &[
            (100.0, 60.0, 40.0, true),
            (100.0, 60.0, 40.5, false),
            (100.0, 60.0, 39.5, true),
            (100.0, 0.0, 100.0, true),
            (100.0, 0.0, 100.125, false),
            (100.0, 0.0, 0.0, true),
            (100.0, 100.0, 0.0, true),
            (100.0, 100.0, 0.125, false),
            (100.0, 100.5, 0.0, false),
            (100.0, 150.0, 0.0, false),
            (1.5, 0.25, 1.25, true),
            (1.5, 0.25, 1.375, false),
            (0.5, 0.125, 0.375, true),
            (0.5, 0.625, 0.0, false),
            (0.0, 0.0, 0.0, true),
            (0.0, 0.0, 0.5, false),
        ];

        for &(max, used, candidate, admitted) in cases {
            let remaining = max - used;
            match IntakeGate::new(max).evaluate(used, candidate) {
                GateDecision::Admit { remaining: reported } => {
                    assert!(admitted, "max={max} used={used} candidate={candidate} admitted");
                    assert_eq!(reported, remaining);
                    assert!(remaining - candidate >= 0.0);
                }
                GateDecision::Reject(outcome) => {
                    assert!(!admitted, "max={max} used={used} candidate={candidate} rejected");
                    assert_eq!(outcome.kind(), "error");
                    assert!(
                        outcome.message().ends_with(&convert_bytes(remaining)),
                        "message was {}",
                        outcome.message()
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn rejected_upload_never_reaches_the_filter() {
        let store = Arc::new(MemoryStore::with(vec![StoredDocumentRecord::new(
            "old.pdf",
            90.0 * MB,
        )]));
        let filter = Arc::new(CountingFilter::returning(IntakeOutcome::success("stored")));
        let service = IntakeService::new(store.clone(), filter.clone(), IntakeGate::new(100.0 * MB));

        let outcome = service
            .ingest(&user(), &upload_of(20.0 * MB))
            .await
            .unwrap();

        assert_eq!(outcome.kind(), "error");
        assert!(outcome.message().contains("10.0 MB"));
        assert_eq!(filter.calls(), 0);
        assert_eq!(store.records.lock().unwrap().len(), 1);
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn admitted_upload_returns_filter_outcome_unchanged() {
        let store = Arc::new(MemoryStore::default());
        let expected = IntakeOutcome::warning("report.pdf is empty after parsing");
        let filter = Arc::new(CountingFilter::returning(expected.clone()));
        let service = IntakeService::new(store.clone(), filter.clone(), IntakeGate::new(100.0 * MB));

        let outcome = service.ingest(&user(), &upload_of(5.0 * MB)).await.unwrap();

        assert_eq!(outcome, expected);
        assert_eq!(filter.calls(), 1);
        assert!(store.records.lock().unwrap().is_empty());
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn successful_intake_counts_toward_the_next_check() {
        let store = Arc::new(MemoryStore::default());
        let filter = Arc::new(CountingFilter::returning(IntakeOutcome::success("stored")));
        let service = IntakeService::new(store.clone(), filter.clone(), IntakeGate::new(10.0 * MB));

        let first = service.ingest(&user(), &upload_of(6.0 * MB)).await.unwrap();
        assert!(first.is_success());

        let second = named_upload("second.pdf", 6.0 * MB);
        let outcome = service.ingest(&user(), &second).await.unwrap();

        assert_eq!(outcome.kind(), "error");
        assert_eq!(filter.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_intakes_cannot_overspend_the_quota() {
        let store = Arc::new(MemoryStore::default());
        let filter = Arc::new(
            CountingFilter::returning(IntakeOutcome::success("stored"))
                .slow(Duration::from_millis(50)),
        );
        let service = IntakeService::new(store.clone(), filter.clone(), IntakeGate::new(10.0 * MB));
        let user = user();
        let first = named_upload("a.pdf", 6.0 * MB);
        let second = named_upload("b.pdf", 6.0 * MB);

        let (a, b) = tokio::join!(
            service.ingest(&user, &first),
            service.ingest(&user, &second)
        );
        let kinds = [a.unwrap().kind(), b.unwrap().kind()];

        assert_eq!(kinds.iter().filter(|kind| **kind == "success").count(), 1);
        assert_eq!(kinds.iter().filter(|kind| **kind == "error").count(), 1);
        assert_eq!(filter.calls(), 1);

        let used = brain_usage(&store.list_user_documents("ada@example.com").unwrap());
        assert_eq!(used, 6.0 * MB);
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn filter_failure_releases_the_reservation() {
        let store = Arc::new(MemoryStore::default());
        let filter = Arc::new(CountingFilter::failing("503 Service Unavailable"));
        let service = IntakeService::new(store.clone(), filter.clone(), IntakeGate::new(10.0 * MB));

        let result = service.ingest(&user(), &upload_of(6.0 * MB)).await;

        assert!(matches!(result, Err(IntakeError::Filter(_))));
        assert_eq!(store.pending_count(), 0);
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_intake_releases_the_reservation() {
        let store = Arc::new(MemoryStore::default());
        let filter = Arc::new(
            CountingFilter::returning(IntakeOutcome::success("stored"))
                .slow(Duration::from_secs(5)),
        );
        let service = IntakeService::new(store.clone(), filter.clone(), IntakeGate::new(10.0 * MB));
        let upload = upload_of(6.0 * MB);

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), service.ingest(&user(), &upload)).await;

        assert!(timed_out.is_err());
        assert_eq!(filter.calls(), 1);
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn unconfirmed_success_keeps_counting_toward_the_quota() {
        let store = Arc::new(MemoryStore {
            fail_confirm: true,
            ..MemoryStore::default()
        });
        let filter = Arc::new(CountingFilter::returning(IntakeOutcome::success("stored")));
        let service = IntakeService::new(store.clone(), filter.clone(), IntakeGate::new(10.0 * MB));

        let result = service.ingest(&user(), &upload_of(6.0 * MB)).await;

        assert!(matches!(
            result,
            Err(IntakeError::RecordStore(StoreError::Unavailable(_)))
        ));
        assert_eq!(store.pending_count(), 1);
        assert_eq!(
            service.check_admission(&user(), 0.0).unwrap(),
            GateDecision::Admit {
                remaining: 4.0 * MB
            }
        );
    }

    #[tokio::test]
    async fn ungated_path_skips_the_quota() {
        let store = Arc::new(MemoryStore::with(vec![StoredDocumentRecord::new(
            "old.pdf",
            200.0,
        )]));
        let filter = Arc::new(CountingFilter::returning(IntakeOutcome::success("stored")));
        let service = IntakeService::new(store, filter.clone(), IntakeGate::new(100.0));

        let outcome = service
            .ingest_ungated(&user(), &upload_of(50.0))
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(filter.calls(), 1);
    }
}
