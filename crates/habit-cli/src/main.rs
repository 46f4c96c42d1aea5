//! Habit - reading statistics from the terminal
//!
//! Reads the same database the reader writes:
//! - Today's progress, totals, and the current streak
//! - Day-by-day history
//! - The saved resume position
//! - Manual entries and a full reset

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use habit_core::{paths, ReaderConfig, SqliteGateway, StatisticsAggregator};

mod commands;

/// Ten years of daily rows
const MAX_HISTORY_DAYS: i64 = 3650;

/// Habit - Quran reading statistics
#[derive(Parser)]
#[command(name = "habit")]
#[command(about = "Reading statistics and last-read position", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.quran-habit/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show today's progress, totals, and streak
    Stats {
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show pages and time for each recent day, oldest first
    History {
        /// Number of days ending today
        #[arg(
            short,
            long,
            default_value_t = 7,
            value_parser = clap::value_parser!(u16).range(1..=MAX_HISTORY_DAYS)
        )]
        days: u16,

        /// Print the series as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the saved last-read position
    Position,

    /// Add reading to a day's totals
    Record {
        /// Pages completed
        #[arg(short, long, default_value_t = 0)]
        pages: u64,

        /// Seconds spent reading
        #[arg(short, long, default_value_t = 0)]
        seconds: u64,

        /// Day to credit as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete all statistics and the saved position
    ///
    /// This cannot be undone.
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

fn init_logging() {
    let log_dir = match paths::ensure_logs_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Failed to create log directory: {}", e);
            return;
        }
    };

    let log_file = match std::fs::File::create(log_dir.join(habit_core::constants::ui::LOG_FILE_NAME))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to create log file: {}, logging disabled", e);
            return;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = match &cli.config {
        Some(path) => ReaderConfig::load_from(path)?,
        None => ReaderConfig::load()?,
    };

    let db_path = config.database_path();
    let gateway = SqliteGateway::open(&db_path)
        .with_context(|| format!("Failed to open {}", db_path.display()))?;
    let stats = StatisticsAggregator::new(Arc::new(gateway))
        .with_qualifying_seconds(config.qualifying_seconds);
    tracing::debug!(db = %db_path.display(), "Opened statistics database");

    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::Stats { json } => commands::stats(&stats, json, &mut out),
        Commands::History { days, json } => {
            commands::history(&stats, usize::from(days), json, &mut out)
        }
        Commands::Position => {
            let layout = config.load_layout()?;
            commands::position(&stats, &layout, &mut out)
        }
        Commands::Record {
            pages,
            seconds,
            date,
        } => commands::record(&stats, pages, seconds, date.as_deref(), &mut out),
        Commands::Reset { yes } => commands::reset(&stats, yes, &mut out),
    }
}
