//! Cache layer: storage for daily and monthly rollup results.
//!
//! Pure storage with no freshness judgment; staleness policy lives in the
//! refresh coordinator. Keys are scoped per granularity (`daily:<date>`,
//! `monthly:<month>`); invalidating a daily key never touches its parent
//! month, the coordinator cascades explicitly. `put` is atomic per key, so
//! readers observe either the previous or the new value, never a partial one.

use crate::domain::Month;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

/// Cache granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    Daily,
    Monthly,
}

impl CacheScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheScope::Daily => "daily",
            CacheScope::Monthly => "monthly",
        }
    }
}

/// Fully qualified cache key: scope plus date-or-month.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: CacheScope,
    pub key: String,
}

impl CacheKey {
    pub fn daily(date: NaiveDate) -> Self {
        CacheKey {
            scope: CacheScope::Daily,
            key: date.to_string(),
        }
    }

    pub fn monthly(month: Month) -> Self {
        CacheKey {
            scope: CacheScope::Monthly,
            key: month.to_string(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.scope.as_str(), self.key)
    }
}

/// One stored cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub value_json: String,
    pub fingerprint: String,
    pub refreshed_at: DateTime<Utc>,
    /// Set by `invalidate`; an invalidated entry is kept for stale-serving
    /// and diagnostics but never treated as current.
    pub invalidated: bool,
}

/// SQLite-backed cache store. The sole owner of cache_entries; every
/// mutation goes through `put`/`invalidate`/`replace_month`.
#[derive(Debug, Clone)]
pub struct CacheLayer {
    pool: SqlitePool,
}

impl CacheLayer {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up an entry. Returns None on miss.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, sqlx::Error> {
        let row: Option<(String, String, String, i64)> = sqlx::query_as(
            "SELECT value_json, fingerprint, refreshed_at, invalidated
             FROM cache_entries WHERE scope = ? AND cache_key = ?",
        )
        .bind(key.scope.as_str())
        .bind(&key.key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(value_json, fingerprint, refreshed_at, invalidated)| CacheEntry {
            value_json,
            fingerprint,
            refreshed_at: parse_timestamp(&refreshed_at),
            invalidated: invalidated != 0,
        }))
    }

    /// Store or overwrite an entry, clearing any invalidation mark.
    pub async fn put(
        &self,
        key: &CacheKey,
        value_json: &str,
        fingerprint: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT OR REPLACE INTO cache_entries
             (scope, cache_key, value_json, fingerprint, refreshed_at, invalidated)
             VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(key.scope.as_str())
        .bind(&key.key)
        .bind(value_json)
        .bind(fingerprint)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark an entry stale without deleting it. No-op on miss.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE cache_entries SET invalidated = 1 WHERE scope = ? AND cache_key = ?")
            .bind(key.scope.as_str())
            .bind(&key.key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Atomically replace every cache entry belonging to a month: all of its
    /// daily keys plus the monthly key, in one transaction. Used by the
    /// diagnostic recompute path.
    pub async fn replace_month(
        &self,
        month: Month,
        daily: &[(NaiveDate, String, String)],
        monthly_value_json: &str,
        monthly_fingerprint: &str,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for day in month.days() {
            sqlx::query("DELETE FROM cache_entries WHERE scope = 'daily' AND cache_key = ?")
                .bind(day.to_string())
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM cache_entries WHERE scope = 'monthly' AND cache_key = ?")
            .bind(month.to_string())
            .execute(&mut *tx)
            .await?;

        for (date, value_json, fingerprint) in daily {
            sqlx::query(
                "INSERT INTO cache_entries
                 (scope, cache_key, value_json, fingerprint, refreshed_at, invalidated)
                 VALUES ('daily', ?, ?, ?, ?, 0)",
            )
            .bind(date.to_string())
            .bind(value_json)
            .bind(fingerprint)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query(
            "INSERT INTO cache_entries
             (scope, cache_key, value_json, fingerprint, refreshed_at, invalidated)
             VALUES ('monthly', ?, ?, ?, ?, 0)",
        )
        .bind(month.to_string())
        .bind(monthly_value_json)
        .bind(monthly_fingerprint)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}
