//! Persistence layer
//!
//! SQLite-based storage for:
//! - The singleton last-read position
//! - Per-day reading counters
//!
//! The reading engine depends only on [`PersistenceGateway`]; [`SqliteGateway`]
//! is the shipped implementation.

use std::time::{SystemTime, UNIX_EPOCH};

mod daily_stats;
mod database;
mod gateway;
mod positions;
mod sqlite;

pub use daily_stats::DailyStatStore;
pub use database::{Database, SharedDatabase};
pub use gateway::{date_key, parse_date_key, DailyStat, PersistenceGateway, ReadingPosition};
pub use positions::PositionStore;
pub use sqlite::SqliteGateway;

/// Get current Unix timestamp in milliseconds
#[inline]
pub fn unix_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
