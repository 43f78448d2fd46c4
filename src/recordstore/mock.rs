//! Mock record store for tests.
//!
//! Holds rows behind a mutex so tests can mutate upstream data mid-scenario,
//! inject failures, and count gateway calls (the aggregation-spy used by the
//! idempotence and de-duplication tests). The fingerprint probe reuses the
//! engine's canonical hash, so probe and aggregation always agree on
//! unchanged data.

use super::{RecordStore, RecordStoreError};
use crate::domain::RawActivityRecord;
use crate::engine::fingerprint_rows;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<RawActivityRecord>,
    failure: Option<RecordStoreError>,
    fetch_calls: usize,
    fingerprint_calls: usize,
}

/// In-memory record store with mutation support and call counters.
#[derive(Debug, Clone, Default)]
pub struct MockRecordStore {
    inner: Arc<Mutex<Inner>>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row (builder style).
    pub fn with_row(self, row: RawActivityRecord) -> Self {
        self.push_row(row);
        self
    }

    /// Add a row to the live store (simulates an upstream insert).
    pub fn push_row(&self, row: RawActivityRecord) {
        self.inner.lock().unwrap().rows.push(row);
    }

    /// Replace the row with the same id (simulates an upstream edit).
    pub fn update_row(&self, row: RawActivityRecord) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.rows.iter_mut().find(|r| r.id == row.id) {
            *existing = row;
        }
    }

    /// Remove a row by id (simulates an upstream delete).
    pub fn remove_row(&self, id: &str) {
        self.inner.lock().unwrap().rows.retain(|r| r.id != id);
    }

    /// Make every subsequent call fail with the given error (None to clear).
    pub fn set_failure(&self, failure: Option<RecordStoreError>) {
        self.inner.lock().unwrap().failure = failure;
    }

    /// Number of full `fetch_raw_records` calls so far.
    pub fn fetch_count(&self) -> usize {
        self.inner.lock().unwrap().fetch_calls
    }

    /// Number of cheap `fetch_fingerprint` probes so far.
    pub fn fingerprint_count(&self) -> usize {
        self.inner.lock().unwrap().fingerprint_calls
    }

    fn rows_in_range(inner: &Inner, start: NaiveDate, end: NaiveDate) -> Vec<RawActivityRecord> {
        inner
            .rows
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn fetch_raw_records(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawActivityRecord>, RecordStoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetch_calls += 1;
        if let Some(err) = &inner.failure {
            return Err(err.clone());
        }
        Ok(Self::rows_in_range(&inner, start, end))
    }

    async fn fetch_fingerprint(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<String, RecordStoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fingerprint_calls += 1;
        if let Some(err) = &inner.failure {
            return Err(err.clone());
        }
        Ok(fingerprint_rows(&Self::rows_in_range(&inner, start, end)))
    }
}
