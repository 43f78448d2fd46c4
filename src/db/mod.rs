//! SQLite-backed persistence for the cache layer.

pub mod migrations;

pub use migrations::init_db;
