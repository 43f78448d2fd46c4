//! Advertiser roster provider.
//!
//! Supplied by the external personnel system; the daily aggregator uses it
//! to guarantee zero-activity records are emitted for every advertiser.

use crate::domain::AdvertiserId;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

#[async_trait]
pub trait AdvertiserRoster: Send + Sync + fmt::Debug {
    /// List every advertiser currently on the roster.
    async fn list_advertisers(&self) -> Result<Vec<AdvertiserId>, RosterError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("roster unavailable: {0}")]
    Unavailable(String),
}

/// Fixed roster, typically loaded from configuration.
#[derive(Debug, Clone)]
pub struct StaticRoster {
    advertisers: Vec<AdvertiserId>,
}

impl StaticRoster {
    pub fn new(advertisers: Vec<AdvertiserId>) -> Self {
        Self { advertisers }
    }
}

#[async_trait]
impl AdvertiserRoster for StaticRoster {
    async fn list_advertisers(&self) -> Result<Vec<AdvertiserId>, RosterError> {
        Ok(self.advertisers.clone())
    }
}
