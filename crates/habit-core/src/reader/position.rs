//! Last-read position
//!
//! Saves are queued on the persistence worker and never block the caller.
//! Loading is the only synchronous path and happens once when a view opens.

use std::sync::Arc;

use anyhow::Result;

use super::layout::PageLayout;
use crate::storage::{unix_timestamp_millis, PersistenceGateway, ReadingPosition};
use crate::worker::PersistenceHandle;

#[derive(Clone)]
pub struct PositionPersister {
    persistence: PersistenceHandle,
    gateway: Arc<dyn PersistenceGateway>,
    layout: Arc<PageLayout>,
}

impl PositionPersister {
    pub fn new(
        persistence: PersistenceHandle,
        gateway: Arc<dyn PersistenceGateway>,
        layout: Arc<PageLayout>,
    ) -> Self {
        Self {
            persistence,
            gateway,
            layout,
        }
    }

    /// Overwrite the saved position; repeated identical saves are harmless
    pub fn save(&self, surah: u16, ayah: u16, page: usize, scroll_offset: u32) {
        tracing::trace!(surah, ayah, page, scroll_offset, "Saving position");
        self.persistence.save_position(ReadingPosition {
            surah,
            ayah,
            page,
            scroll_offset,
            saved_at: unix_timestamp_millis(),
        });
    }

    /// Save using the layout's coordinates for `page`
    pub fn save_page(&self, page: usize, scroll_offset: u32) {
        let (surah, ayah) = self.layout.last_ayah_on_page(page);
        self.save(surah, ayah, page, scroll_offset);
    }

    /// The saved position clamped to the current layout; `None` means no history
    pub fn load(&self) -> Result<Option<ReadingPosition>> {
        Ok(self
            .gateway
            .get_position()?
            .map(|position| self.layout.clamp(position)))
    }

    /// Like [`load`](Self::load), but a storage error is logged and treated as no history
    pub fn load_or_default(&self) -> Option<ReadingPosition> {
        match self.load() {
            Ok(position) => position,
            Err(e) => {
                let detail = format!("{:#}", e);
                tracing::warn!(error = %detail, "Failed to load reading position, starting fresh");
                None
            }
        }
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }
}
