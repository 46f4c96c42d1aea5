//! Centralized path utilities
//!
//! All application paths in one place for consistency

use std::path::PathBuf;

use crate::constants::ui;

/// Get the config directory (~/.quran-habit)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(ui::CONFIG_DIR_NAME)
}

/// Get the config file (~/.quran-habit/config.toml)
pub fn config_path() -> PathBuf {
    config_dir().join(ui::CONFIG_FILE_NAME)
}

/// Get the default database file (~/.quran-habit/habit.db)
pub fn database_path() -> PathBuf {
    config_dir().join(ui::DATABASE_FILE_NAME)
}

/// Get the logs directory (~/.quran-habit/logs)
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Ensure the logs directory exists, creating it if necessary
pub fn ensure_logs_dir() -> std::io::Result<PathBuf> {
    let dir = logs_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
