use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::IntakeError;
use crate::model::{AuthenticatedUser, StoredDocumentRecord};
use crate::traits::DocumentStore;

/// Sum of sizes over distinct `(name, size)` pairs.
///
/// Document rows are written once per stored chunk upstream, so the same file
/// shows up many times; identical pairs collapse to one.
pub fn brain_usage(records: &[StoredDocumentRecord]) -> f64 {
    let mut seen: HashSet<(&str, u64)> = HashSet::with_capacity(records.len());
    let mut total = 0.0;

    for record in records {
        if seen.insert((record.name.as_str(), size_key(record.size))) {
            total += record.size;
        }
    }

    total
}

// -0.0 and 0.0 must hash the same.
fn size_key(size: f64) -> u64 {
    if size == 0.0 {
        0.0f64.to_bits()
    } else {
        size.to_bits()
    }
}

#[derive(Clone)]
pub struct QuotaCalculator {
    store: Arc<dyn DocumentStore>,
}

impl QuotaCalculator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Bytes currently used by `user`. Store failures propagate.
    pub fn current_usage(&self, user: &AuthenticatedUser) -> Result<f64, IntakeError> {
        let records = self.store.list_user_documents(user.email())?;
        let usage = brain_usage(&records);
        debug!(
            user = %user,
            records = records.len(),
            usage,
            "calculated brain usage"
        );
        Ok(usage)
    }

    pub(crate) fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }
}
