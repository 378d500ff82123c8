//! Ledger overview for the `status` command.
//!
//! A quick read on how far the pipeline has gotten: how many messages are
//! recorded, how many made it to the wiki, and when anything last moved.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::ledger::Ledger;

/// Run the status command: query the ledger and print a summary.
pub async fn run_status(config: &Config) -> Result<()> {
    let ledger = Ledger::new(db::connect(config).await?);
    let counts = ledger.counts().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Wikiscribe — Ledger Status");
    println!("==========================");
    println!();
    println!("  Database:      {}", config.db.path.display());
    println!("  Size:          {}", format_bytes(db_size));
    println!();
    println!("  Messages:      {}", counts.total);
    println!(
        "  Published:     {} / {} ({}%)",
        counts.published,
        counts.total,
        if counts.total > 0 {
            (counts.published * 100) / counts.total
        } else {
            0
        }
    );
    println!("  Pending:       {}", counts.pending);
    println!(
        "  Last activity: {}",
        match counts.last_updated_at {
            Some(ts) => format_ts_relative(ts),
            None => "never".to_string(),
        }
    );
    println!();

    ledger.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
