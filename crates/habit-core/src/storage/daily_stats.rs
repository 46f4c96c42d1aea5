//! Per-day reading counters

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::database::Database;
use super::gateway::{date_key, parse_date_key, DailyStat};

pub struct DailyStatStore<'a> {
    db: &'a Database,
}

impl<'a> DailyStatStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Add deltas to the row for `date`, creating it if needed
    ///
    /// A single statement, so concurrent increments for the same day cannot
    /// lose updates.
    pub fn increment(&self, date: NaiveDate, pages_delta: u64, seconds_delta: u64) -> Result<()> {
        self.db.conn().execute(
            "INSERT INTO daily_stat (date, pages_read, seconds_read)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(date) DO UPDATE SET
                 pages_read = pages_read + excluded.pages_read,
                 seconds_read = seconds_read + excluded.seconds_read",
            params![date_key(date), to_sql(pages_delta), to_sql(seconds_delta)],
        )?;
        Ok(())
    }

    pub fn get(&self, date: NaiveDate) -> Result<Option<DailyStat>> {
        let row = self
            .db
            .conn()
            .query_row(
                "SELECT date, pages_read, seconds_read FROM daily_stat WHERE date = ?1",
                [date_key(date)],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(Self::map_row).transpose()
    }

    pub fn sum_pages(&self) -> Result<u64> {
        self.sum("pages_read")
    }

    pub fn sum_seconds(&self) -> Result<u64> {
        self.sum("seconds_read")
    }

    fn sum(&self, column: &str) -> Result<u64> {
        let sql = format!("SELECT COALESCE(SUM({}), 0) FROM daily_stat", column);
        let total: i64 = self.db.conn().query_row(&sql, [], |row| row.get(0))?;
        Ok(total.max(0) as u64)
    }

    /// Stored rows between `start` and `end` inclusive, oldest first
    pub fn range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyStat>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT date, pages_read, seconds_read FROM daily_stat
             WHERE date BETWEEN ?1 AND ?2
             ORDER BY date ASC",
        )?;
        let rows = stmt
            .query_map(params![date_key(start), date_key(end)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(Self::map_row).collect()
    }

    fn map_row((date, pages, seconds): (String, i64, i64)) -> Result<DailyStat> {
        Ok(DailyStat {
            date: parse_date_key(&date)?,
            pages_read: pages.max(0) as u64,
            seconds_read: seconds.max(0) as u64,
        })
    }
}

fn to_sql(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).expect("valid date")
    }

    #[test]
    fn test_increment_accumulates_both_counters() {
        let db = Database::open_in_memory().expect("Failed to open database");
        let store = DailyStatStore::new(&db);

        store.increment(day(1), 1, 500).expect("first upsert");
        store.increment(day(1), 0, 100).expect("second upsert");

        let stat = store.get(day(1)).expect("get").expect("row exists");
        assert_eq!(stat.pages_read, 1);
        assert_eq!(stat.seconds_read, 600);
        assert!(store.get(day(2)).expect("get").is_none());
    }

    #[test]
    fn test_range_is_sparse_and_ordered() {
        let db = Database::open_in_memory().expect("Failed to open database");
        let store = DailyStatStore::new(&db);

        store.increment(day(5), 2, 0).expect("upsert");
        store.increment(day(2), 1, 30).expect("upsert");
        store.increment(day(9), 4, 0).expect("upsert");

        let rows = store.range(day(1), day(5)).expect("range");
        let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(2), day(5)]);
    }

    #[test]
    fn test_sums() {
        let db = Database::open_in_memory().expect("Failed to open database");
        let store = DailyStatStore::new(&db);

        assert_eq!(store.sum_pages().expect("sum"), 0);
        store.increment(day(1), 3, 120).expect("upsert");
        store.increment(day(2), 2, 60).expect("upsert");
        assert_eq!(store.sum_pages().expect("sum"), 5);
        assert_eq!(store.sum_seconds().expect("sum"), 180);
    }
}
