//! Subcommand implementations
//!
//! Each command writes to the given writer so tests can capture output.

use std::io::Write;

use anyhow::{bail, Result};
use chrono::{DateTime, Local};

use habit_core::stats::local_today;
use habit_core::storage::parse_date_key;
use habit_core::{DailyStat, PageLayout, StatisticsAggregator};

/// Widest bar drawn by `history`
const BAR_WIDTH: u64 = 30;

pub fn stats(stats: &StatisticsAggregator, json: bool, out: &mut impl Write) -> Result<()> {
    let summary = stats.summary()?;

    if json {
        serde_json::to_writer_pretty(&mut *out, &summary)?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(
        out,
        "Today:         {} pages, {}",
        summary.pages_today,
        format_duration(summary.seconds_today)
    )?;
    writeln!(out, "Last 30 days:  {} pages", summary.pages_last_30_days)?;
    writeln!(
        out,
        "All time:      {} pages, {}",
        summary.total_pages,
        format_duration(summary.total_seconds)
    )?;
    writeln!(out, "Streak:        {}", plural(summary.streak_days.into(), "day"))?;
    Ok(())
}

pub fn history(
    stats: &StatisticsAggregator,
    days: usize,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let series = stats.time_series(days)?;

    if json {
        serde_json::to_writer_pretty(&mut *out, &series)?;
        writeln!(out)?;
        return Ok(());
    }

    let max_pages = series.iter().map(|d| d.pages_read).max().unwrap_or(0);
    for day in &series {
        writeln!(out, "{}", history_line(day, max_pages))?;
    }
    Ok(())
}

/// Saved position, pulled back into the bounds of `layout`
pub fn position(
    stats: &StatisticsAggregator,
    layout: &PageLayout,
    out: &mut impl Write,
) -> Result<()> {
    let Some(position) = stats.gateway().get_position()? else {
        writeln!(out, "No reading history yet")?;
        return Ok(());
    };
    let position = layout.clamp(position);

    let saved = DateTime::from_timestamp_millis(position.saved_at)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    writeln!(
        out,
        "Surah {}, ayah {} (page {}, offset {}), saved {}",
        position.surah,
        position.ayah,
        position.page + 1,
        position.scroll_offset,
        saved
    )?;
    Ok(())
}

pub fn record(
    stats: &StatisticsAggregator,
    pages: u64,
    seconds: u64,
    date: Option<&str>,
    out: &mut impl Write,
) -> Result<()> {
    if pages == 0 && seconds == 0 {
        bail!("Nothing to record: pass --pages and/or --seconds");
    }

    let date = match date {
        Some(key) => parse_date_key(key)?,
        None => local_today(),
    };
    stats.upsert_daily(date, pages, seconds)?;
    tracing::info!(%date, pages, seconds, "Recorded reading manually");

    writeln!(
        out,
        "Recorded {} and {} for {}",
        plural(pages, "page"),
        format_duration(seconds),
        date
    )?;
    Ok(())
}

pub fn reset(stats: &StatisticsAggregator, confirmed: bool, out: &mut impl Write) -> Result<()> {
    if !confirmed {
        bail!("Refusing to delete all reading data without --yes");
    }
    stats.reset_all()?;
    writeln!(out, "All reading data deleted")?;
    Ok(())
}

/// `1h 05m`, `12m 30s`, `45s`
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

fn plural(count: u64, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

fn history_line(day: &DailyStat, max_pages: u64) -> String {
    let width = if max_pages == 0 {
        0
    } else {
        (day.pages_read * BAR_WIDTH).div_ceil(max_pages)
    };
    format!(
        "{}  {:>3} pages  {:>8}  {}",
        day.date.format("%a %d %b"),
        day.pages_read,
        format_duration(day.seconds_read),
        "#".repeat(width as usize)
    )
    .trim_end()
    .to_string()
}
