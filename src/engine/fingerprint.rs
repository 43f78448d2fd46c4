//! Canonical source-row fingerprinting.
//!
//! One function computes the fingerprint everywhere: the daily aggregator
//! hashes the rows it fetched, and the record store's cheap fingerprint
//! probe must produce the same digest for the same rows. Any insert, edit,
//! or delete of a contributing row changes the digest.

use crate::domain::RawActivityRecord;
use sha2::{Digest, Sha256};

/// Stable SHA-256 fingerprint over a set of raw rows.
///
/// Rows are sorted by id before hashing, so the digest is independent of
/// fetch order. The empty set has a well-defined fingerprint.
pub fn fingerprint_rows(rows: &[RawActivityRecord]) -> String {
    let mut sorted: Vec<&RawActivityRecord> = rows.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut hasher = Sha256::new();
    for row in sorted {
        hasher.update(row.id.as_bytes());
        hasher.update(b"|");
        hasher.update(row.advertiser.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(row.date.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(row.ad_spend_usd.to_canonical_string().as_bytes());
        hasher.update(b"|");
        hasher.update(row.collected_amount_local.to_canonical_string().as_bytes());
        hasher.update(b"|");
        hasher.update(row.order_count.to_string().as_bytes());
        hasher.update(b"\n");
    }
    let hash = hasher.finalize();
    hex::encode(&hash[..16])
}
