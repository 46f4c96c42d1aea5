//! Last-read position storage
//!
//! A single row (id = 1) that every save overwrites.

use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use super::database::Database;
use super::gateway::ReadingPosition;

pub struct PositionStore<'a> {
    db: &'a Database,
}

impl<'a> PositionStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Overwrite the stored position
    pub fn upsert(&self, position: &ReadingPosition) -> Result<()> {
        self.db.conn().execute(
            "INSERT INTO last_read_position (id, surah, ayah, page, scroll_y, timestamp)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 surah = excluded.surah,
                 ayah = excluded.ayah,
                 page = excluded.page,
                 scroll_y = excluded.scroll_y,
                 timestamp = excluded.timestamp",
            params![
                position.surah,
                position.ayah,
                position.page as i64,
                position.scroll_offset,
                position.saved_at
            ],
        )?;

        tracing::trace!(
            surah = position.surah,
            ayah = position.ayah,
            page = position.page,
            scroll_y = position.scroll_offset,
            "Saved position"
        );
        Ok(())
    }

    pub fn get(&self) -> Result<Option<ReadingPosition>> {
        let position = self
            .db
            .conn()
            .query_row(
                "SELECT surah, ayah, page, scroll_y, timestamp
                 FROM last_read_position WHERE id = 1",
                [],
                |row| {
                    let page: i64 = row.get(2)?;
                    Ok(ReadingPosition {
                        surah: row.get(0)?,
                        ayah: row.get(1)?,
                        page: page.max(0) as usize,
                        scroll_offset: row.get(3)?,
                        saved_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(position)
    }
}
