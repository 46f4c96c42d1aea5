//! Callbacks into the UI layer
//!
//! All methods run on the session's event task and must return quickly.

use crate::storage::ReadingPosition;

pub trait ReaderUi: Send {
    /// A page was genuinely read (once per completion)
    fn on_page_marked_read(&mut self, _page: usize) {}

    /// A saved position is about to be restored
    fn on_position_ready_for_resume(&mut self, _position: &ReadingPosition) {}

    /// Header text changed; `page_display_index` is 1-based
    fn on_header_info_changed(&mut self, _surah: u16, _page_display_index: usize) {}

    /// A background write failed; suitable for a dismissible notice
    fn on_persistence_failed(&mut self, _message: &str) {}
}

/// UI that ignores every callback
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUi;

impl ReaderUi for NoopUi {}
