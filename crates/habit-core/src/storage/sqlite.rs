//! SQLite implementation of the persistence gateway

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use super::daily_stats::DailyStatStore;
use super::database::{Database, SharedDatabase};
use super::gateway::{date_key, DailyStat, PersistenceGateway, ReadingPosition};
use super::positions::PositionStore;

#[derive(Clone)]
pub struct SqliteGateway {
    db: SharedDatabase,
}

impl SqliteGateway {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Open the database file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Arc::new(Database::new(path)?)))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Arc::new(Database::open_in_memory()?)))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}

impl PersistenceGateway for SqliteGateway {
    fn upsert_position(
        &self,
        surah: u16,
        ayah: u16,
        page: usize,
        scroll_offset: u32,
        timestamp: i64,
    ) -> Result<()> {
        let position = ReadingPosition {
            surah,
            ayah,
            page,
            scroll_offset,
            saved_at: timestamp,
        };
        PositionStore::new(&self.db)
            .upsert(&position)
            .context("Failed to save reading position")
    }

    fn get_position(&self) -> Result<Option<ReadingPosition>> {
        PositionStore::new(&self.db)
            .get()
            .context("Failed to load reading position")
    }

    fn upsert_daily(&self, date: NaiveDate, pages_delta: u64, seconds_delta: u64) -> Result<()> {
        DailyStatStore::new(&self.db)
            .increment(date, pages_delta, seconds_delta)
            .with_context(|| format!("Failed to update statistics for {}", date_key(date)))
    }

    fn get_daily(&self, date: NaiveDate) -> Result<Option<DailyStat>> {
        DailyStatStore::new(&self.db)
            .get(date)
            .with_context(|| format!("Failed to load statistics for {}", date_key(date)))
    }

    fn sum_pages(&self) -> Result<u64> {
        DailyStatStore::new(&self.db).sum_pages()
    }

    fn sum_seconds(&self) -> Result<u64> {
        DailyStatStore::new(&self.db).sum_seconds()
    }

    fn get_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyStat>> {
        DailyStatStore::new(&self.db).range(start, end).with_context(|| {
            format!(
                "Failed to load statistics from {} to {}",
                date_key(start),
                date_key(end)
            )
        })
    }

    fn delete_all(&self) -> Result<()> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;
        let days = tx.execute("DELETE FROM daily_stat", [])?;
        tx.execute("DELETE FROM last_read_position", [])?;
        tx.commit().context("Failed to reset reading data")?;

        tracing::info!(days_deleted = days, "Reset all reading data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_gateway() -> (SqliteGateway, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let gateway = SqliteGateway::open(&db_path).expect("Failed to create database");
        (gateway, temp_dir)
    }

    #[test]
    fn test_delete_all_clears_position_and_days() {
        let (gateway, _temp) = create_test_gateway();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");

        gateway.upsert_daily(date, 2, 300).expect("upsert daily");
        gateway
            .upsert_position(1, 7, 0, 250, 1_700_000_000_000)
            .expect("upsert position");

        gateway.delete_all().expect("delete all");

        assert_eq!(gateway.sum_pages().expect("sum"), 0);
        assert_eq!(gateway.sum_seconds().expect("sum"), 0);
        assert!(gateway.get_position().expect("get").is_none());
        assert!(gateway.get_daily(date).expect("get").is_none());
    }

    #[test]
    fn test_concurrent_increments_do_not_lose_updates() {
        let (gateway, _temp) = create_test_gateway();
        let gateway = Arc::new(gateway);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gateway = Arc::clone(&gateway);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        gateway.upsert_daily(date, 1, 2).expect("upsert");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread panicked");
        }

        let stat = gateway.get_daily(date).expect("get").expect("row exists");
        assert_eq!(stat.pages_read, 200);
        assert_eq!(stat.seconds_read, 400);
    }
}
