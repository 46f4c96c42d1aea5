//! Reader configuration
//!
//! Loaded from `~/.quran-habit/config.toml`. Every field is optional; a missing
//! file means all defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::constants::{scroll, stats, timing};
use crate::paths;
use crate::reader::PageLayout;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Tunables for the reading engine and where its data lives
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub settle_delay_ms: u64,
    pub bottom_dwell_ms: u64,
    pub resume_settle_ms: u64,
    pub bottom_buffer: u32,
    pub scroll_error_margin: u32,
    /// Seconds of reading that qualify a day for the streak without a page read
    pub qualifying_seconds: u64,
    /// Page shown on a cold start with no saved position
    pub start_page: usize,
    /// Database location override (defaults to ~/.quran-habit/habit.db)
    pub database_path: Option<PathBuf>,
    /// JSON page layout used to map pages to surah/ayah coordinates
    pub layout_path: Option<PathBuf>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: timing::SETTLE_DELAY_MS,
            bottom_dwell_ms: timing::BOTTOM_DWELL_MS,
            resume_settle_ms: timing::RESUME_SETTLE_MS,
            bottom_buffer: scroll::BOTTOM_BUFFER,
            scroll_error_margin: scroll::SCROLL_ERROR_MARGIN,
            qualifying_seconds: stats::QUALIFYING_SECONDS,
            start_page: 0,
            database_path: None,
            layout_path: None,
        }
    }
}

impl ReaderConfig {
    /// Load from the default config location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&paths::config_path())
    }

    /// Load from a specific file, falling back to defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn bottom_dwell(&self) -> Duration {
        Duration::from_millis(self.bottom_dwell_ms)
    }

    pub fn resume_settle(&self) -> Duration {
        Duration::from_millis(self.resume_settle_ms)
    }

    /// Resolved database path
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(paths::database_path)
    }

    /// Page layout from `layout_path`, or the empty layout when none is set
    pub fn load_layout(&self) -> anyhow::Result<PageLayout> {
        match &self.layout_path {
            Some(path) => PageLayout::from_json_file(path),
            None => Ok(PageLayout::default()),
        }
    }
}
