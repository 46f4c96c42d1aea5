//! Quran Habit core
//!
//! Reading-session engine for a paginated document:
//! - Scroll observation and bottom-of-page detection
//! - Per-page completion tracking driven by settle and dwell timers
//! - Exact last-read position for resume
//! - Daily reading statistics, streaks, and time series

pub mod config;
pub mod constants;
pub mod paths;
pub mod reader;
pub mod stats;
pub mod storage;
pub mod worker;

pub use config::ReaderConfig;
pub use reader::{PageLayout, ReaderEvent, ReaderUi, ReadingSession};
pub use stats::{ProgressFeed, ReadingSummary, StatisticsAggregator};
pub use storage::{DailyStat, PersistenceGateway, ReadingPosition, SqliteGateway};
pub use worker::{PersistenceHandle, PersistenceWorker};
