//! Shared constants

/// Reader timing defaults (milliseconds)
pub mod timing {
    /// Delay after a page becomes active before it may be marked read
    pub const SETTLE_DELAY_MS: u64 = 3000;
    /// Sustained bottom-of-page time required before completion is evaluated
    pub const BOTTOM_DWELL_MS: u64 = 1000;
    /// How long scroll signals stay suppressed after a programmatic resume
    pub const RESUME_SETTLE_MS: u64 = 500;
}

/// Scroll geometry defaults (surface units)
pub mod scroll {
    /// Distance from the end of content that still counts as "at bottom"
    pub const BOTTOM_BUFFER: u32 = 16;
    /// Offset deltas at or below this are jitter, not scrolling
    pub const SCROLL_ERROR_MARGIN: u32 = 16;
}

/// Statistics rules
pub mod stats {
    /// A day with this much reading time counts toward the streak even with no pages
    pub const QUALIFYING_SECONDS: u64 = 60;
    /// Days covered by the monthly chart
    pub const MONTH_DAYS: usize = 30;
    /// Days covered by the weekly chart
    pub const WEEK_DAYS: usize = 7;
    /// Storage key format for daily rows
    pub const DATE_FORMAT: &str = "%Y-%m-%d";
}

/// Document coordinates
pub mod document {
    pub const SURAH_COUNT: u16 = 114;
}

/// File and directory names
pub mod ui {
    pub const CONFIG_DIR_NAME: &str = ".quran-habit";
    pub const CONFIG_FILE_NAME: &str = "config.toml";
    pub const DATABASE_FILE_NAME: &str = "habit.db";
    pub const LOG_FILE_NAME: &str = "habit.log";
}
