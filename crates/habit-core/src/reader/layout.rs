//! Page layout
//!
//! Maps page indices to the surah/ayah ranges printed on them. The layout is
//! data, loaded from JSON; an empty layout leaves page indices unbounded and
//! reports surah 1, ayah 1 for every page.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::document::SURAH_COUNT;
use crate::storage::ReadingPosition;

/// Consecutive ayahs of one surah on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AyahRange {
    pub surah: u16,
    pub first_ayah: u16,
    pub last_ayah: u16,
}

impl AyahRange {
    pub fn contains(&self, surah: u16, ayah: u16) -> bool {
        self.surah == surah && (self.first_ayah..=self.last_ayah).contains(&ayah)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLayout {
    /// Ranges per page, in reading order
    pages: Vec<Vec<AyahRange>>,
}

impl PageLayout {
    pub fn new(pages: Vec<Vec<AyahRange>>) -> Self {
        Self { pages }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read page layout {}", path.display()))?;
        let layout: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid page layout {}", path.display()))?;
        tracing::info!(pages = layout.page_count(), path = %path.display(), "Loaded page layout");
        Ok(layout)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Nearest valid page index
    pub fn clamp_page(&self, page: usize) -> usize {
        if self.pages.is_empty() {
            page
        } else {
            page.min(self.pages.len() - 1)
        }
    }

    /// Surah shown in the header for `page`: the first one starting on it
    pub fn surah_for_page(&self, page: usize) -> u16 {
        self.ranges(page)
            .and_then(|ranges| ranges.first())
            .map_or(1, |range| range.surah)
    }

    /// Coordinates saved as the position when `page` is current
    pub fn last_ayah_on_page(&self, page: usize) -> (u16, u16) {
        self.ranges(page)
            .and_then(|ranges| ranges.last())
            .map_or((1, 1), |range| (range.surah, range.last_ayah))
    }

    /// First page on which `surah` appears, or page 0 when unknown
    pub fn first_page_for_surah(&self, surah: u16) -> usize {
        self.pages
            .iter()
            .position(|ranges| ranges.iter().any(|r| r.surah == surah))
            .unwrap_or(0)
    }

    /// Page containing the ayah; falls back to the surah's first page
    pub fn page_for_ayah(&self, surah: u16, ayah: u16) -> usize {
        self.pages
            .iter()
            .position(|ranges| ranges.iter().any(|r| r.contains(surah, ayah)))
            .unwrap_or_else(|| self.first_page_for_surah(surah))
    }

    /// Pull a possibly stale position back into valid bounds
    pub fn clamp(&self, position: ReadingPosition) -> ReadingPosition {
        let surah = position.surah.clamp(1, SURAH_COUNT);
        let mut ayah = position.ayah.max(1);
        if let Some(max) = self.max_ayah(surah) {
            ayah = ayah.min(max);
        }

        let clamped = ReadingPosition {
            surah,
            ayah,
            page: self.clamp_page(position.page),
            ..position
        };
        if clamped != position {
            tracing::warn!(
                from_page = position.page,
                to_page = clamped.page,
                surah = clamped.surah,
                ayah = clamped.ayah,
                "Clamped saved position into layout bounds"
            );
        }
        clamped
    }

    fn ranges(&self, page: usize) -> Option<&[AyahRange]> {
        self.pages.get(page).map(Vec::as_slice)
    }

    fn max_ayah(&self, surah: u16) -> Option<u16> {
        self.pages
            .iter()
            .flatten()
            .filter(|r| r.surah == surah)
            .map(|r| r.last_ayah)
            .max()
    }
}
