//! Record store abstraction: read-only access to raw advertising-activity
//! rows and a cheap content fingerprint for a date range.

use crate::domain::RawActivityRecord;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

pub mod http;
pub mod mock;
pub mod roster;

pub use http::HttpRecordStore;
pub use mock::MockRecordStore;
pub use roster::{AdvertiserRoster, RosterError, StaticRoster};

/// Read-only gateway to the upstream record store.
///
/// The engine never writes through this trait; raw rows are owned and
/// mutated only by the upstream system.
#[async_trait]
pub trait RecordStore: Send + Sync + fmt::Debug {
    /// Fetch every raw row with a date in `[start, end]` (inclusive).
    async fn fetch_raw_records(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawActivityRecord>, RecordStoreError>;

    /// Fetch the current content fingerprint for `[start, end]`.
    ///
    /// Much cheaper than `fetch_raw_records`; used by the staleness probe.
    /// Must equal `fingerprint_rows` over the rows `fetch_raw_records` would
    /// return for the same range.
    async fn fetch_fingerprint(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<String, RecordStoreError>;
}

/// Error type for record store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordStoreError {
    #[error("network error: {0}")]
    Network(String),
    #[error("http error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    /// Request exceeded the configured bound; surfaces upstream as
    /// SourceUnavailable rather than hanging the refresh chain.
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Other(String),
}
