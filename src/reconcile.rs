//! Optimistic list reconciliation.
//!
//! Holds the collection a consumer displays and applies single-record
//! mutations in place, so a create/update/delete does not force a full
//! refetch. `replace_all` is the escape hatch for a genuine resync and
//! reports the smallest change it can prove.

use crate::types::Car;

/// Minimal change produced by a reconciler mutation, for consumers that
/// redraw incrementally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    Inserted(usize),
    Updated(usize),
    Removed(usize),
    /// Collection size changed; everything should be redrawn.
    Reloaded,
    /// Same-size refresh; only the listed positions changed.
    UpdatedMany(Vec<usize>),
}

/// Ordered collection of records, unique by persisted id.
///
/// Order is client insertion order, newest first: a deliberate recency bias
/// that does not mirror server-side ordering. Not internally synchronized:
/// mutations and reads must happen on the same context.
#[derive(Debug, Default)]
pub struct ListReconciler {
    records: Vec<Car>,
}

impl ListReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Car] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Prepend a previously-unseen record.
    ///
    /// Panics if a record with the same persisted id is already present:
    /// insert is for records the collection has never held, and the caller
    /// decides insert-vs-update by whether the record was persisted before.
    pub fn insert(&mut self, record: Car) -> ListEvent {
        if let Some(id) = record.persisted_id() {
            assert!(
                self.position(id).is_none(),
                "insert requires a previously-unseen record id"
            );
        }
        self.records.insert(0, record);
        ListEvent::Inserted(0)
    }

    /// Replace the record with the same id in place.
    ///
    /// Returns `None` when the id is not currently visible. That is a miss,
    /// not an error: the target may simply have scrolled out of this view.
    pub fn update(&mut self, record: Car) -> Option<ListEvent> {
        let index = self.position(record.persisted_id()?)?;
        self.records[index] = record;
        Some(ListEvent::Updated(index))
    }

    /// Remove the record with this id, if visible.
    pub fn remove(&mut self, id: &str) -> Option<ListEvent> {
        let index = self.position(id)?;
        self.records.remove(index);
        Some(ListEvent::Removed(index))
    }

    /// Full resync after a complete fetch.
    ///
    /// When the size is unchanged the positions are compared value-by-value
    /// so a consumer repaints only what actually differs.
    pub fn replace_all(&mut self, records: Vec<Car>) -> ListEvent {
        if records.len() != self.records.len() {
            self.records = records;
            return ListEvent::Reloaded;
        }

        let changed: Vec<usize> = self
            .records
            .iter()
            .zip(&records)
            .enumerate()
            .filter(|(_, (old, new))| old != new)
            .map(|(index, _)| index)
            .collect();
        self.records = records;
        ListEvent::UpdatedMany(changed)
    }

    fn position(&self, id: &str) -> Option<usize> {
        if id.is_empty() {
            return None;
        }
        self.records
            .iter()
            .position(|r| r.id.as_deref() == Some(id))
    }
}
