//! Scenario replay
//!
//! Drives a notifier with scripted record deliveries and change events on a
//! virtual clock, collecting everything it emits.

use crate::config::{AppConfig, Step};
use anyhow::{Context, Result};
use record_watch_core::{
    change_event_message, channel_for, Decision, FieldValue, InMemoryTransport, ManualTimer,
    Notifier, RecordData, RecordingSource, WatchEvent,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// An event emitted by the notifier during the replay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    /// 1-based step that was running when the event was emitted
    pub step: usize,
    /// Virtual time in milliseconds
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: WatchEvent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub deliveries: usize,
    pub ignored: usize,
    pub baselines: usize,
    pub suppressed: usize,
    pub transitions: usize,
    pub toasts: usize,
    pub refreshes: usize,
    pub change_events: usize,
    pub refetches: usize,
    pub subscribed: bool,
    /// Delayed refreshes still waiting when the replay ended
    pub pending_refreshes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayReport {
    pub entries: Vec<ReportEntry>,
    pub summary: ReplaySummary,
}

/// Run every step of the scenario against a fresh notifier
pub async fn run(config: &AppConfig) -> Result<ReplayReport> {
    let source = Arc::new(RecordingSource::new());
    let transport = Arc::new(InMemoryTransport::new());
    let timer = Arc::new(ManualTimer::new());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let watch = config.watch.clone();
    let channel = channel_for(watch.object_name.as_deref());
    let watched_id = watch.record_id.clone().unwrap_or_default();

    let mut notifier = Notifier::new(watch, source.clone(), transport.clone(), timer.clone(), tx);
    let mut report = ReplayReport::default();

    notifier.activate().await;
    report.summary.subscribed = notifier.is_subscribed();

    for (idx, step) in config.steps.iter().enumerate() {
        let number = idx + 1;
        log::debug!("Step {}: {:?}", number, step);

        match step {
            Step::Record { id, value, missing_field } => {
                let mut data = RecordData::new(id.clone().unwrap_or_else(|| watched_id.clone()));
                if !missing_field {
                    let value = value.clone().unwrap_or(FieldValue::Null);
                    data = data.with_field(notifier.config().field_name.clone(), value);
                }
                record_decision(&mut report.summary, notifier.on_record(Ok(data)));
            }
            Step::SourceError { message } => {
                record_decision(&mut report.summary, notifier.on_record(Err(message.clone())));
            }
            Step::ChangeEvent { record_ids, raw } => {
                let message = match raw {
                    Some(raw) => serde_json::from_str::<serde_json::Value>(raw)
                        .with_context(|| format!("Step {}: invalid raw change event", number))?,
                    None => {
                        let ids: Vec<&str> = record_ids.iter().map(String::as_str).collect();
                        change_event_message("UPDATE", &ids)
                    }
                };
                match &channel {
                    Some(channel) => {
                        transport.publish(channel, &message);
                        report.summary.change_events += 1;
                    }
                    None => log::warn!("Step {}: no change-event channel, event dropped", number),
                }
            }
            Step::Advance { ms } => {
                timer.advance(Duration::from_millis(*ms));
            }
        }

        collect(&mut rx, &mut report, number, &timer);
    }

    notifier.deactivate().await;

    report.summary.refetches = source.refetch_count();
    report.summary.pending_refreshes = timer.pending();
    Ok(report)
}

fn record_decision(summary: &mut ReplaySummary, decision: Option<Decision>) {
    summary.deliveries += 1;
    match decision {
        None => summary.ignored += 1,
        Some(Decision::Baseline) => summary.baselines += 1,
        Some(Decision::Suppressed) => summary.suppressed += 1,
        Some(Decision::Notify { .. }) => summary.transitions += 1,
    }
}

/// Whole milliseconds, saturating at `u64::MAX`
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn collect(
    rx: &mut UnboundedReceiver<WatchEvent>,
    report: &mut ReplayReport,
    step: usize,
    timer: &ManualTimer,
) {
    let at_ms = millis(timer.now());
    while let Ok(event) = rx.try_recv() {
        match &event {
            WatchEvent::Toast(_) => report.summary.toasts += 1,
            WatchEvent::Refresh => report.summary.refreshes += 1,
        }
        report.entries.push(ReportEntry { step, at_ms, event });
    }
}
