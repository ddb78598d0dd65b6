use super::DisposeResult;
use dashmap::DashMap;
use fw_model::operations::FieldRef;

/// What the analyzed methods did with a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldDisposal {
    /// Some method stored a disposable object it created into the field.
    pub owned: bool,
    /// Some method left the field disposed at its exit.
    pub disposed: bool,
}

/// Field dispose facts gathered over every method of a run. Methods can be
/// recorded concurrently, facts are merged by logical or.
#[derive(Debug, Default)]
pub struct FieldDisposeLedger {
    fields: DashMap<FieldRef, FieldDisposal>,
}

impl FieldDisposeLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, result: &DisposeResult) {
        for field in result.owned_fields() {
            self.record_owned(field);
        }
        for field in result.disposed_fields() {
            self.record_disposed(&field);
        }
    }

    pub fn record_owned(&self, field: &FieldRef) {
        self.fields.entry(field.clone()).or_default().owned = true;
    }

    pub fn record_disposed(&self, field: &FieldRef) {
        self.fields.entry(field.clone()).or_default().disposed = true;
    }

    #[must_use]
    pub fn get(&self, field: &FieldRef) -> Option<FieldDisposal> {
        self.fields.get(field).map(|disposal| *disposal)
    }

    /// Fields that are owned but that no method disposes, sorted.
    #[must_use]
    pub fn undisposed_fields(&self) -> Vec<FieldRef> {
        let mut fields: Vec<_> = self
            .fields
            .iter()
            .filter(|entry| entry.owned && !entry.disposed)
            .map(|entry| entry.key().clone())
            .collect();
        fields.sort();
        fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
