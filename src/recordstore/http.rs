//! HTTP record store client.
//!
//! Talks to the upstream data service over two GET endpoints:
//! `/records?start=..&end=..` returning a JSON array of raw rows, and
//! `/fingerprint?start=..&end=..` returning `{"fingerprint": "..."}`.
//! Transient failures (network, 429, 5xx) retry with exponential backoff;
//! 4xx responses are permanent. Every request carries a bounded timeout.

use super::{RecordStore, RecordStoreError};
use crate::domain::RawActivityRecord;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Record store client over the upstream HTTP data service.
#[derive(Debug, Clone)]
pub struct HttpRecordStore {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct FingerprintResponse {
    fingerprint: String,
}

impl HttpRecordStore {
    /// Create a client with a bounded per-request timeout.
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, base_url }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<T, RecordStoreError> {
        let url = format!("{}{}", self.base_url, path);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(&url)
                .query(&[("start", start.to_string()), ("end", end.to_string())])
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        backoff::Error::permanent(RecordStoreError::Timeout)
                    } else {
                        backoff::Error::transient(RecordStoreError::Network(e.to_string()))
                    }
                })?;

            let status = response.status();
            if status == 429 || status.is_server_error() {
                return Err(backoff::Error::transient(RecordStoreError::Http {
                    status: status.as_u16(),
                    message: "upstream error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(RecordStoreError::Http {
                    status: status.as_u16(),
                    message: "client error".to_string(),
                }));
            }

            response
                .json::<T>()
                .await
                .map_err(|e| backoff::Error::permanent(RecordStoreError::Parse(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn fetch_raw_records(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawActivityRecord>, RecordStoreError> {
        debug!(%start, %end, "fetching raw records");
        self.get_json::<Vec<RawActivityRecord>>("/records", start, end)
            .await
    }

    async fn fetch_fingerprint(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<String, RecordStoreError> {
        debug!(%start, %end, "fetching fingerprint");
        let resp = self
            .get_json::<FingerprintResponse>("/fingerprint", start, end)
            .await?;
        Ok(resp.fingerprint)
    }
}
