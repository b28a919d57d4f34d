//! Report generation
//!
//! Renders a replay as a plain-text report or as JSON lines.

use crate::replay::{ReplayReport, ReportEntry};
use anyhow::Result;
use record_watch_core::{WatchConfig, WatchEvent};
use std::io::Write;

/// Write a human-readable report
pub fn write_text<W: Write>(
    out: &mut W,
    config: &WatchConfig,
    report: &ReplayReport,
) -> Result<()> {
    writeln!(out, "═══════════════════════════════════════════════")?;
    writeln!(out, "  Record Watch - Replay Report")?;
    writeln!(out, "═══════════════════════════════════════════════")?;
    writeln!(out, "Generated: {}", chrono::Utc::now().to_rfc3339())?;
    writeln!(
        out,
        "Watching:  {}.{} on {}",
        config.object_name.as_deref().unwrap_or("-"),
        config.field_name,
        config.record_id.as_deref().unwrap_or("-")
    )?;
    writeln!(out)?;

    if report.entries.is_empty() {
        writeln!(out, "No notifications were emitted.")?;
    }
    for entry in &report.entries {
        writeln!(out, "{}", format_entry(entry))?;
    }

    let s = &report.summary;
    writeln!(out)?;
    writeln!(out, "Summary")?;
    writeln!(out, "───────────────────────────────────────────────")?;
    writeln!(out, "  Subscribed:        {}", if s.subscribed { "yes" } else { "no" })?;
    writeln!(out, "  Deliveries:        {} ({} ignored)", s.deliveries, s.ignored)?;
    writeln!(out, "  Baselines:         {}", s.baselines)?;
    writeln!(out, "  Suppressed:        {}", s.suppressed)?;
    writeln!(out, "  Transitions:       {}", s.transitions)?;
    writeln!(out, "  Toasts:            {}", s.toasts)?;
    writeln!(out, "  Refreshes:         {}", s.refreshes)?;
    writeln!(out, "  Change events:     {}", s.change_events)?;
    writeln!(out, "  Refetch requests:  {}", s.refetches)?;
    if s.pending_refreshes > 0 {
        writeln!(out, "  Pending refreshes: {}", s.pending_refreshes)?;
    }

    Ok(())
}

/// Write one JSON object per event followed by the summary
pub fn write_json<W: Write>(out: &mut W, report: &ReplayReport) -> Result<()> {
    for entry in &report.entries {
        writeln!(out, "{}", serde_json::to_string(entry)?)?;
    }
    writeln!(out, "{}", serde_json::to_string(&report.summary)?)?;
    Ok(())
}

fn format_entry(entry: &ReportEntry) -> String {
    let prefix = format!("[step {:>3} | t+{:>6}ms]", entry.step, entry.at_ms);
    match &entry.event {
        WatchEvent::Toast(toast) => format!(
            "{} TOAST ({}, {}) {}: {}",
            prefix, toast.variant, toast.mode, toast.title, toast.message
        ),
        WatchEvent::Refresh => format!("{} REFRESH", prefix),
    }
}
