//! Persistence gateway contract and the records it stores

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::stats::DATE_FORMAT;

/// The single resume point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingPosition {
    pub surah: u16,
    pub ayah: u16,
    pub page: usize,
    /// Offset within the page; zero is a real position, not "unset"
    pub scroll_offset: u32,
    /// Unix millis of the save
    pub saved_at: i64,
}

/// Reading counters for one calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStat {
    pub date: NaiveDate,
    pub pages_read: u64,
    pub seconds_read: u64,
}

impl DailyStat {
    /// A zero row, used to fill gaps in sparse ranges
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            pages_read: 0,
            seconds_read: 0,
        }
    }

    /// Whether this day counts toward a streak
    pub fn qualifies(&self, qualifying_seconds: u64) -> bool {
        self.pages_read >= 1 || self.seconds_read >= qualifying_seconds
    }
}

/// Storage key for a date (`YYYY-MM-DD`)
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date_key(key: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(key, DATE_FORMAT)
        .with_context(|| format!("Invalid date key '{}'", key))
}

/// Storage operations the reading engine consumes
///
/// Implementations must make `upsert_daily` atomic for a given date.
pub trait PersistenceGateway: Send + Sync {
    fn upsert_position(
        &self,
        surah: u16,
        ayah: u16,
        page: usize,
        scroll_offset: u32,
        timestamp: i64,
    ) -> Result<()>;

    fn get_position(&self) -> Result<Option<ReadingPosition>>;

    fn upsert_daily(&self, date: NaiveDate, pages_delta: u64, seconds_delta: u64) -> Result<()>;

    fn get_daily(&self, date: NaiveDate) -> Result<Option<DailyStat>>;

    fn sum_pages(&self) -> Result<u64>;

    fn sum_seconds(&self) -> Result<u64>;

    /// Rows with `start <= date <= end`, ascending; days without a row are absent
    fn get_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyStat>>;

    fn delete_all(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_key_roundtrip_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).expect("valid date");
        assert_eq!(date_key(date), "2024-03-07");
        assert_eq!(parse_date_key("2024-03-07").expect("parse"), date);
        assert!(parse_date_key("07/03/2024").is_err());
    }

    #[test]
    fn test_qualifying_day() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
        let mut stat = DailyStat::empty(date);
        assert!(!stat.qualifies(60));

        stat.seconds_read = 59;
        assert!(!stat.qualifies(60));
        stat.seconds_read = 60;
        assert!(stat.qualifies(60));

        let pages_only = DailyStat {
            date,
            pages_read: 1,
            seconds_read: 0,
        };
        assert!(pages_only.qualifies(60));
    }
}
