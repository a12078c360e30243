//! Month-keyed store of financial records.

use std::collections::BTreeMap;

use pnl_core::models::{MonthKey, MonthlyRecord, RecordPatch};
use tracing::debug;

/// Chronologically ordered `MonthKey → MonthlyRecord` table.
///
/// Records are never edited in place: every merge builds a new record and
/// swaps it in. There is no removal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinancialStore {
    records: BTreeMap<MonthKey, MonthlyRecord>,
}

impl FinancialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = (MonthKey, MonthlyRecord)>) -> Self {
        let mut store = Self::new();
        store.seed(records);
        store
    }

    pub fn get(&self, month: &MonthKey) -> Option<&MonthlyRecord> {
        self.records.get(month)
    }

    /// All months with a record, oldest first.
    pub fn months(&self) -> Vec<MonthKey> {
        self.records.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MonthKey, &MonthlyRecord)> {
        self.records.iter()
    }

    /// Merge one category's fields into `month`.
    ///
    /// The patch's category replaces whatever that month held for it; the
    /// other categories keep their values. A month with no record starts from
    /// zeros.
    pub fn apply(&mut self, month: MonthKey, patch: &RecordPatch) {
        let next = match self.records.get(&month) {
            Some(existing) => patch.apply(existing),
            None => patch.apply(&MonthlyRecord::default()),
        };
        debug!("Applied {} patch to {}", patch.category(), month);
        self.records.insert(month, next);
    }

    /// Insert whole records, replacing any existing record for the same month.
    pub fn seed(&mut self, records: impl IntoIterator<Item = (MonthKey, MonthlyRecord)>) {
        for (month, record) in records {
            self.records.insert(month, record);
        }
    }
}
