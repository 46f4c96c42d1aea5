//! Reading statistics
//!
//! Daily counters live in storage; everything else (totals, streak, charts) is
//! derived on read.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Days, Local, NaiveDate};
use serde::Serialize;

use crate::constants::stats::{MONTH_DAYS, QUALIFYING_SECONDS, WEEK_DAYS};
use crate::storage::{DailyStat, PersistenceGateway};

mod feed;

pub use feed::ProgressFeed;

/// Days fetched per query while walking a streak backwards
const STREAK_WINDOW_DAYS: u64 = 31;

/// Today's date on the local calendar
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Snapshot behind the statistics screen
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadingSummary {
    pub pages_today: u64,
    pub seconds_today: u64,
    pub pages_last_30_days: u64,
    pub total_pages: u64,
    pub total_seconds: u64,
    pub streak_days: u32,
    /// Last 30 days, oldest first
    pub monthly: Vec<DailyStat>,
    /// Last 7 days, oldest first
    pub weekly: Vec<DailyStat>,
}

/// Derived statistics over a persistence gateway
#[derive(Clone)]
pub struct StatisticsAggregator {
    gateway: Arc<dyn PersistenceGateway>,
    qualifying_seconds: u64,
}

impl StatisticsAggregator {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            gateway,
            qualifying_seconds: QUALIFYING_SECONDS,
        }
    }

    /// Override the seconds needed for a page-less day to keep the streak
    pub fn with_qualifying_seconds(mut self, seconds: u64) -> Self {
        self.qualifying_seconds = seconds;
        self
    }

    pub fn gateway(&self) -> &Arc<dyn PersistenceGateway> {
        &self.gateway
    }

    pub fn upsert_daily(&self, date: NaiveDate, pages_delta: u64, seconds_delta: u64) -> Result<()> {
        if pages_delta == 0 && seconds_delta == 0 {
            return Ok(());
        }
        self.gateway.upsert_daily(date, pages_delta, seconds_delta)?;
        tracing::debug!(%date, pages_delta, seconds_delta, "Recorded reading");
        Ok(())
    }

    pub fn total_pages_read(&self) -> Result<u64> {
        self.gateway.sum_pages()
    }

    pub fn total_seconds_read(&self) -> Result<u64> {
        self.gateway.sum_seconds()
    }

    pub fn pages_read(&self, date: NaiveDate) -> Result<u64> {
        Ok(self.gateway.get_daily(date)?.map_or(0, |d| d.pages_read))
    }

    pub fn seconds_read(&self, date: NaiveDate) -> Result<u64> {
        Ok(self.gateway.get_daily(date)?.map_or(0, |d| d.seconds_read))
    }

    pub fn current_streak_days(&self) -> Result<u32> {
        self.current_streak_days_on(local_today())
    }

    /// Consecutive qualifying days ending at `today`
    ///
    /// Zero when `today` itself does not qualify. A missing row ends the walk.
    pub fn current_streak_days_on(&self, today: NaiveDate) -> Result<u32> {
        let mut streak = 0u32;
        let mut window_end = today;

        loop {
            let window_start = window_end
                .checked_sub_days(Days::new(STREAK_WINDOW_DAYS - 1))
                .unwrap_or(NaiveDate::MIN);
            let rows: HashMap<NaiveDate, DailyStat> = self
                .gateway
                .get_range(window_start, window_end)?
                .into_iter()
                .map(|row| (row.date, row))
                .collect();

            let mut day = window_end;
            loop {
                match rows.get(&day) {
                    Some(row) if row.qualifies(self.qualifying_seconds) => streak += 1,
                    _ => return Ok(streak),
                }
                if day == window_start {
                    break;
                }
                day = match day.pred_opt() {
                    Some(prev) => prev,
                    None => return Ok(streak),
                };
            }

            // Whole window qualified; continue with the one before it
            window_end = match window_start.pred_opt() {
                Some(prev) => prev,
                None => return Ok(streak),
            };
        }
    }

    pub fn time_series(&self, days: usize) -> Result<Vec<DailyStat>> {
        self.time_series_on(local_today(), days)
    }

    /// Exactly `days` entries ending at `today`, oldest first, zero-filled
    pub fn time_series_on(&self, today: NaiveDate, days: usize) -> Result<Vec<DailyStat>> {
        if days == 0 {
            return Ok(Vec::new());
        }

        let start = today
            .checked_sub_days(Days::new(days as u64 - 1))
            .unwrap_or(NaiveDate::MIN);
        let mut rows: HashMap<NaiveDate, DailyStat> = self
            .gateway
            .get_range(start, today)?
            .into_iter()
            .map(|row| (row.date, row))
            .collect();

        Ok(start
            .iter_days()
            .take(days)
            .map(|date| rows.remove(&date).unwrap_or_else(|| DailyStat::empty(date)))
            .collect())
    }

    pub fn summary(&self) -> Result<ReadingSummary> {
        self.summary_on(local_today())
    }

    pub fn summary_on(&self, today: NaiveDate) -> Result<ReadingSummary> {
        let monthly = self.time_series_on(today, MONTH_DAYS)?;
        let weekly = monthly[monthly.len().saturating_sub(WEEK_DAYS)..].to_vec();
        let (pages_today, seconds_today) = monthly
            .last()
            .map_or((0, 0), |d| (d.pages_read, d.seconds_read));

        Ok(ReadingSummary {
            pages_today,
            seconds_today,
            pages_last_30_days: monthly.iter().map(|d| d.pages_read).sum(),
            total_pages: self.total_pages_read()?,
            total_seconds: self.total_seconds_read()?,
            streak_days: self.current_streak_days_on(today)?,
            monthly,
            weekly,
        })
    }

    /// Delete every daily row and the saved position
    pub fn reset_all(&self) -> Result<()> {
        self.gateway.delete_all()
    }
}
