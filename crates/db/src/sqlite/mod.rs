//! SQLite-Backend des Session Store

pub mod pool;
pub mod sessions;

pub use pool::SqliteDb;
