pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod recordstore;

pub use cache::{CacheEntry, CacheKey, CacheLayer, CacheScope};
pub use config::Config;
pub use db::init_db;
pub use domain::{
    AdvertiserId, DailyCommissionRecord, Decimal, Month, MonthlyCommissionSummary,
    RawActivityRecord, Tier,
};
pub use engine::{evaluate, DailyAggregator, EngineError};
pub use error::AppError;
pub use orchestration::{
    DiagnosticRecomputer, RangeBounds, RefreshCoordinator, StalePolicy,
};
pub use recordstore::{
    AdvertiserRoster, HttpRecordStore, MockRecordStore, RecordStore, RecordStoreError,
    StaticRoster,
};
